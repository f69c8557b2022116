//! Logging front end.  Goes to defmt on the target, to the `log` crate on a
//! host, or nowhere.

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, info, warn};

#[cfg(all(feature = "log", not(feature = "defmt")))]
pub(crate) use logger_crate::{debug, info, warn};

#[cfg(not(any(feature = "log", feature = "defmt")))]
mod quiet {
    macro_rules! debug {
        ( $( $x:expr ),* ) => { $( let _ = &$x; )* };
    }
    pub(crate) use debug;
    macro_rules! info {
        ( $( $x:expr ),* ) => { $( let _ = &$x; )* };
    }
    pub(crate) use info;
    macro_rules! warning {
        ( $( $x:expr ),* ) => { $( let _ = &$x; )* };
    }
    pub(crate) use warning as warn;
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
pub(crate) use quiet::{debug, info, warn};
