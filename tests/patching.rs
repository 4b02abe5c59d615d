//! End-to-end patch sessions driven through the public API.
//!
//! Each test builds an image, seeds free space, applies a mix of jump patches and shared
//! routines, and checks the resulting bytes and free set.

use snespatch::{asm::opcodes::NOP, prelude::*};
use tempfile::tempdir;

const ROM_SIZE: usize = 0x4_0000;

/// A 256 KiB HiROM image with a valid-looking header and `0xFF` padding in the last bank.
fn sample_rom() -> Vec<u8> {
    let mut data: Vec<u8> = (0..ROM_SIZE).map(|i| (i % 0xFB) as u8).collect();
    data[0xFFC0..0xFFD5].copy_from_slice(b"SNESPATCH TEST ROM   ");
    data[0xFFD5] = 0x31;
    data[0x3_8000..].fill(0xFF);
    data
}

fn session_image() -> Result<RomImage> {
    let mut image = RomImage::from_mem(sample_rom(), &SessionConfig::default())?;
    image.scan_padding(0xFF, 0x100, None)?;
    Ok(image)
}

fn hook_routine(return_to: u32) -> Result<AsmList> {
    Ok(vec![
        Instruction::implied(Mnemonic::Php)?.into(),
        Instruction::rep(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT)?.into(),
        Instruction::immediate16(Mnemonic::Lda, 0x1234)?.into(),
        Instruction::implied(Mnemonic::Plp)?.into(),
        Instruction::long(Mnemonic::Jml, return_to)?.into(),
    ])
}

fn counter_routine() -> Result<AsmList> {
    Ok(vec![
        Instruction::immediate16(Mnemonic::Ldx, 0x0010)?.into(),
        AsmItem::label("loop"),
        Instruction::implied(Mnemonic::Dex)?.into(),
        Instruction::branch(Mnemonic::Bne, "loop")?.into(),
        Instruction::implied(Mnemonic::Rtl)?.into(),
    ])
}

/// Runs the same sequence of requests against a fresh image and returns the result.
fn run_session() -> Result<(Vec<u32>, RomImage)> {
    let mut image = session_image()?;
    let mut patcher = BinaryPatcher::new(&mut image);

    let mut addrs = Vec::new();
    let shared = patcher.add_jsl_routine(&counter_routine()?, None)?;
    addrs.push(shared);

    let mut with_call = hook_routine(0xC0_8006)?;
    with_call.insert(1, patcher.jsl_to(shared)?.into());
    addrs.push(patcher.apply_jmp_patch(&with_call, 0x8000, Some(0x8006))?);

    addrs.push(patcher.add_jsl_routine(&counter_routine()?, Some(0x3_C000))?);
    let request = PatchRequest::new(hook_routine(0xC1_2008)?, 0x1_2000, 0x1_2008);
    addrs.push(patcher.apply(&request)?);

    Ok((addrs, image))
}

#[test_log::test]
fn full_session() -> Result<()> {
    let (addrs, image) = run_session()?;
    assert_eq!(addrs, vec![0x3_8000, 0x3_8007, 0x3_C000, 0x3_8016]);

    let data = image.as_slice();

    // The shared routine branches back onto DEX.
    assert_eq!(
        &data[0x3_8000..0x3_8007],
        &[0xA2, 0x10, 0x00, 0xCA, 0xD0, 0xFD, 0x6B]
    );

    // Hook at $C0:8000 jumps to $C3:8007 and pads the rest of the site.
    assert_eq!(&data[0x8000..0x8006], &[0x5C, 0x07, 0x80, 0xC3, NOP, NOP]);
    assert_eq!(
        &data[0x3_8007..0x3_8016],
        &[
            0x08, 0x22, 0x00, 0x80, 0xC3, 0xC2, 0x30, 0xA9, 0x34, 0x12, 0x28, 0x5C, 0x06, 0x80,
            0xC0
        ]
    );

    // Hook at $C1:2000 replaces 8 bytes.
    assert_eq!(
        &data[0x1_2000..0x1_2008],
        &[0x5C, 0x16, 0x80, 0xC3, NOP, NOP, NOP, NOP]
    );

    // Every allocated range is gone from the free set.
    for (addr, len) in [(0x3_8000, 7), (0x3_8007, 0xF), (0x3_C000, 7), (0x3_8016, 0xB)] {
        let range = ByteRange::from_len(addr, len)?;
        assert!(image.space().free_ranges().all(|free| !free.overlaps(&range)));
    }
    assert_eq!(image.space().total_free(), 0x8000 - 7 - 0xF - 7 - 0xB);
    Ok(())
}

#[test]
fn sessions_are_deterministic() -> Result<()> {
    let (first_addrs, first) = run_session()?;
    let (second_addrs, second) = run_session()?;

    assert_eq!(first_addrs, second_addrs);
    assert_eq!(first.as_slice(), second.as_slice());
    assert_eq!(first.md5(), second.md5());
    Ok(())
}

#[test]
fn allocations_never_overlap() -> Result<()> {
    let mut image = session_image()?;
    let mut patcher = BinaryPatcher::new(&mut image);

    let mut placed: Vec<ByteRange> = Vec::new();
    for i in 0..200u32 {
        let routine: AsmList = vec![AsmItem::Bytes(vec![0xEA; (i % 37 + 1) as usize])];
        let hint = (i % 5 == 0).then_some(0x3_8000 + i * 0x97);
        let addr = patcher.add_jsl_routine(&routine, hint)?;
        let range = ByteRange::from_len(addr, i % 37 + 1)?;

        assert!(placed.iter().all(|other| !other.overlaps(&range)));
        // One bank per routine: nothing crosses a 64 KiB boundary.
        assert_eq!(range.start() >> 16, (range.end() - 1) >> 16);
        placed.push(range);
    }
    Ok(())
}

#[test_log::test]
fn too_small_site_leaves_image_untouched() -> Result<()> {
    let mut image = session_image()?;
    let before = image.clone();

    let result = BinaryPatcher::new(&mut image).apply_jmp_patch(
        &hook_routine(0xC0_8003)?,
        0x8000,
        Some(0x8003),
    );

    assert!(matches!(result, Err(Error::PatchSiteTooSmall { required: 4, .. })));
    assert_eq!(image.as_slice(), before.as_slice());
    assert_eq!(image.space(), before.space());
    Ok(())
}

#[test]
fn running_out_of_space() -> Result<()> {
    let mut image = session_image()?;
    let free = image.space().total_free();
    let largest = image.space().largest_placeable_block();

    let routine: AsmList = vec![AsmItem::Bytes(vec![0xEA; largest as usize + 1])];
    match BinaryPatcher::new(&mut image).add_jsl_routine(&routine, None) {
        Err(Error::InsufficientSpace {
            requested,
            free_bytes,
            largest_block,
        }) => {
            assert_eq!(requested, largest + 1);
            assert_eq!(free_bytes, free);
            assert_eq!(largest_block, largest);
        }
        other => panic!("unexpected result {other:?}"),
    }
    Ok(())
}

#[test]
fn file_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("source.sfc");
    let target = dir.path().join("patched.sfc");

    // Dump with a copier header in front.
    let mut dump = vec![0u8; 0x200];
    dump.extend(sample_rom());
    std::fs::write(&source, &dump)?;

    let digest = RomImage::from_mem(sample_rom(), &SessionConfig::minimal())?.md5();
    let config = SessionConfig::default().with_expected_md5(&digest)?;

    let mut image = RomImage::from_file(&source, &config)?;
    assert_eq!(image.len(), ROM_SIZE);
    image.scan_padding(0xFF, 0x100, None)?;

    BinaryPatcher::new(&mut image).apply_jmp_patch(
        &hook_routine(0xC0_8006)?,
        0x8000,
        Some(0x8006),
    )?;
    image.write_to_file(&target)?;

    let written = std::fs::read(&target)?;
    assert_eq!(written.len(), ROM_SIZE);
    assert_eq!(&written[0x8000..0x8004], &[0x5C, 0x00, 0x80, 0xC3]);

    let reloaded = RomImage::from_file(&target, &SessionConfig::minimal())?;
    let header = reloaded.header()?;
    assert!(header.is_consistent());
    assert_eq!(header.title(), "SNESPATCH TEST ROM");
    assert_eq!(
        header.checksum(),
        snespatch::image::compute_checksum(reloaded.as_slice(), Mapping::HiRom)?
    );

    // The original digest no longer matches the patched image.
    assert!(matches!(
        RomImage::from_file(&target, &config),
        Err(Error::HashMismatch { .. })
    ));
    Ok(())
}

#[test]
fn lorom_session() -> Result<()> {
    let config = SessionConfig::default().with_mapping(Mapping::LoRom);
    let mut image = RomImage::from_mem(vec![0u8; 0x2_0000], &config)?;
    image.seed_free_space([ByteRange::new(0x1_7FF8, 0x1_8100)?])?;

    let routine: AsmList = vec![AsmItem::Bytes(vec![0xEA; 0x10])];
    let addr = BinaryPatcher::new(&mut image).apply_jmp_patch(&routine, 0x0100, None)?;

    // 0x17FF8 would straddle the bank at 0x18000.
    assert_eq!(addr, 0x1_8000);
    assert_eq!(&image.as_slice()[0x100..0x104], &[0x5C, 0x00, 0x80, 0x83]);
    Ok(())
}
