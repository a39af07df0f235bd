#![cfg(feature = "fatfs")]

use rand::{Rng, SeedableRng};

use sdfile::config::SECTOR_SIZE;
use sdfile::volume::{FatVolume, RamDisk};
use sdfile::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn random_payloads_survive_remount() {
    init();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xd7);
    let mut disk = RamDisk::new(SECTOR_SIZE, 16 * 1024);

    let mut payloads = Vec::new();
    {
        let vol = FatVolume::format(&mut disk).unwrap();
        for _ in 0..4 {
            let len = rng.gen_range(1..20_000);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let stem = next_filename_stem_matching_pattern(&vol, "RND???").unwrap();
            let mut file = File::open(&vol, &format!("{}.DAT", stem), OpenMode::OUT | OpenMode::TRUNC);
            file.write(&payload).unwrap();
            file.close().unwrap();
            payloads.push(payload);
        }
        vol.unmount().unwrap();
    }

    let vol = FatVolume::mount(&mut disk).unwrap();
    let entries: Vec<DirEntry> = read_dir(&vol, "", "RND*.DAT").collect();
    assert_eq!(entries.len(), payloads.len());
    for (entry, payload) in entries.iter().zip(&payloads) {
        assert!(entry.is_regular_file());
        assert_eq!(entry.size, payload.len() as u64);

        let mut file = File::open(&vol, &entry.name, OpenMode::IN);
        let mut buf = vec![0u8; payload.len()];
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, payload);
    }
}

#[test]
fn random_access_rewrite() {
    init();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let vol = FatVolume::format(RamDisk::new(SECTOR_SIZE, 8 * 1024)).unwrap();

    let mut model = vec![0u8; 10_000];
    rng.fill(&mut model[..]);
    let mut file = File::open(&vol, "RW.BIN", OpenMode::IN | OpenMode::OUT | OpenMode::TRUNC);
    file.write(&model).unwrap();

    for _ in 0..20 {
        let offset = rng.gen_range(0..model.len() - 100);
        let patch: Vec<u8> = (0..100).map(|_| rng.gen()).collect();
        file.seek(offset as u64).unwrap();
        file.write(&patch).unwrap();
        model[offset..offset + 100].copy_from_slice(&patch);
    }
    assert_eq!(file.size(), Some(model.len() as u64));

    file.seek(0).unwrap();
    let mut buf = vec![0u8; model.len()];
    file.read(&mut buf).unwrap();
    assert_eq!(buf, model);
}

#[test]
fn root_listing() {
    init();
    let vol = FatVolume::format(RamDisk::new(SECTOR_SIZE, 8 * 1024)).unwrap();
    File::open(&vol, "CAP000.BIN", OpenMode::OUT | OpenMode::TRUNC)
        .close()
        .unwrap();
    let listed: Vec<(String, bool)> = read_dir(&vol, "/", "*")
        .map(|e| (e.name.clone(), e.is_dir()))
        .collect();
    assert_eq!(listed, [(String::from("CAP000.BIN"), false)]);
    assert_eq!(next_filename_stem_in(&vol, "NODIR", "CAP???"), None);
}
