// ROM backend testing.

use std::cell::RefCell;

use boot::{Error, Partition, RomBackend};
use simflash::{gen::GenBuilder, styles, SimFlash, ERASED};
use storage::devices::STM32F4_512K;

const APPLICATION: usize = 0x0800_8000;
const END: usize = 0x0808_0000;

fn flash() -> RefCell<SimFlash> {
    RefCell::new(SimFlash::new_dirty(&STM32F4_512K, 9))
}

fn partition() -> Partition {
    Partition::from_map(&STM32F4_512K, 0x8000)
}

#[test]
fn partition_layout() {
    let part = partition();
    assert_eq!(part.application, APPLICATION);
    assert_eq!(part.end, END);
    assert_eq!(part.capacity(), 480 * 1024);
}

#[test]
fn write_requires_session() {
    let flash = flash();
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let img = GenBuilder::default().size(16).build().unwrap();

    assert!(!backend.is_upgrading());
    assert_eq!(backend.write(0, &img.data), Err(Error::NoSession));

    backend.begin_upgrade();
    assert!(backend.is_upgrading());
    assert_eq!(backend.write(0, &img.data), Ok(16));

    backend.end_upgrade(true);
    assert!(!backend.is_upgrading());
    assert_eq!(backend.write(16, &img.data), Err(Error::NoSession));
}

#[test]
fn empty_writes() {
    let flash = flash();
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());

    backend.begin_upgrade();
    assert_eq!(backend.write(0, &[]), Ok(0));
    assert_eq!(backend.write(0, &Vec::new()), Ok(0));
    assert!(backend.is_upgrading());
    assert!(flash.borrow().erases().is_empty());

    // The session is still usable.
    let img = GenBuilder::default().size(16).build().unwrap();
    assert_eq!(backend.write(0, &img.data), Ok(16));
}

#[test]
fn full_image_round_trip() {
    for (style, flash) in styles::all_flashes() {
        let flash = RefCell::new(flash);
        let part = Partition::from_map(style.map, style.application_offset);
        let mut backend = RomBackend::new(&flash, style.map, part);
        let img = GenBuilder::default().seed(11).build().unwrap();

        backend.begin_upgrade();
        for (offset, chunk) in img.chunks(256) {
            assert_eq!(backend.write(offset, chunk), Ok(chunk.len()), "{}", style.name);
        }
        backend.end_upgrade(true);

        let mut back = vec![0u8; img.data.len()];
        assert_eq!(backend.read(0, &mut back), Ok(img.data.len()));
        assert_eq!(back, img.data, "{}", style.name);

        // Nothing below the application was erased.
        let first = style.map.index_of(style.application()).unwrap();
        assert_eq!(flash.borrow().erases().first(), Some(&first), "{}", style.name);
    }
}

#[test]
fn gaps_are_skipped() {
    let flash = flash();
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let img = GenBuilder::default().size(64).build().unwrap();

    backend.begin_upgrade();
    assert_eq!(backend.write(0, &img.data[..32]), Ok(32));
    assert_eq!(backend.write(1024, &img.data[32..]), Ok(32));

    let flash = flash.borrow();
    assert_eq!(flash.contents(APPLICATION, 32), &img.data[..32]);
    assert_eq!(flash.contents(APPLICATION + 32, 992), &[ERASED; 992][..]);
    assert_eq!(flash.contents(APPLICATION + 1024, 32), &img.data[32..]);
    assert_eq!(flash.erases(), &[2]);
}

#[test]
fn backwards_write_rejected() {
    let flash = flash();
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let img = GenBuilder::default().size(64).build().unwrap();

    backend.begin_upgrade();
    assert_eq!(backend.write(0, &img.data), Ok(64));
    assert_eq!(backend.write(32, &img.data[..32]), Err(Error::NotSequential));
    // A rejected request does not end the session.
    assert_eq!(backend.write(64, &img.data), Ok(64));
}

#[test]
fn writes_clamped_to_end_of_flash() {
    let flash = flash();
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let img = GenBuilder::default().size(16).build().unwrap();
    let last = END - APPLICATION - 4;

    backend.begin_upgrade();
    assert_eq!(backend.write(last, &img.data), Ok(4));
    assert_eq!(flash.borrow().contents(END - 4, 4), &img.data[..4]);
    assert_eq!(flash.borrow().erases(), &[7]);

    assert_eq!(
        backend.write(last + 4, &img.data),
        Err(Error::Flash(storage::Error::OutOfBounds))
    );
}

#[test]
fn failure_ends_session() {
    let flash = flash();
    flash.borrow_mut().corrupt_at(APPLICATION + 3, 0x80);
    let mut backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let img = GenBuilder::default().size(32).build().unwrap();

    backend.begin_upgrade();
    assert_eq!(
        backend.write(0, &img.data),
        Err(Error::Flash(storage::Error::Mismatch))
    );
    assert_eq!(backend.write(32, &img.data), Err(Error::Aborted));

    // A new session starts over from the top.
    flash.borrow_mut().corrupt_at(APPLICATION + 3, 0);
    backend.begin_upgrade();
    assert_eq!(backend.write(0, &img.data), Ok(32));
    assert_eq!(flash.borrow().erases(), &[2, 2]);
}

#[test]
fn reads_clamped() {
    let flash = flash();
    let backend = RomBackend::new(&flash, &STM32F4_512K, partition());
    let mut buf = [0u8; 16];
    let last = END - APPLICATION - 4;

    assert_eq!(backend.read(last, &mut buf), Ok(4));
    assert_eq!(&buf[..4], flash.borrow().contents(END - 4, 4));
    assert_eq!(
        backend.read(last + 4, &mut buf),
        Err(Error::Flash(storage::Error::OutOfBounds))
    );
    assert_eq!(
        backend.read(usize::MAX, &mut buf),
        Err(Error::Flash(storage::Error::OutOfBounds))
    );
}
