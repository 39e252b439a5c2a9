//! Integration coverage across the read-only file-system parser and the
//! file-descriptor dispatch layer built on top of it — the interaction
//! `fs::mod`'s own unit tests don't exercise, since they stop at
//! `FileSystem` itself.

use trios_kernel::error::KernelError;
use trios_kernel::fd::{self, FileDescriptor, FileKind};
use trios_kernel::fs::{FileSystem, BLOCK_SIZE, FILENAME_LEN};

/// A little builder for in-memory images, laid out per spec §6: boot block,
/// then `inode_count` inode blocks, then `data_count` data blocks, every
/// block 4096 bytes.
struct ImageBuilder {
    bytes: Vec<u8>,
    dentries: u32,
    inodes: u32,
    data_blocks: u32,
}

impl ImageBuilder {
    fn new(inode_count: u32, data_count: u32) -> Self {
        let total = BLOCK_SIZE * (1 + inode_count as usize + data_count as usize);
        Self {
            bytes: vec![0u8; total],
            dentries: 0,
            inodes: inode_count,
            data_blocks: data_count,
        }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn add_dentry(&mut self, name: &[u8], kind: u32, inode_num: u32) {
        let idx = self.dentries as usize;
        let base = 64 + idx * 64;
        self.bytes[base..base + name.len()].copy_from_slice(name);
        self.write_u32(base + FILENAME_LEN, kind);
        self.write_u32(base + FILENAME_LEN + 4, inode_num);
        self.dentries += 1;
    }

    /// Write an inode whose data blocks are `block_nums`, content `data`
    /// (spread across those blocks in order).
    fn add_inode(&mut self, inode_num: u32, block_nums: &[u32], data: &[u8]) {
        let inode_base = BLOCK_SIZE + inode_num as usize * BLOCK_SIZE;
        self.write_u32(inode_base, data.len() as u32);
        for (i, &block_num) in block_nums.iter().enumerate() {
            self.write_u32(inode_base + 4 + i * 4, block_num);
        }
        let data_region = BLOCK_SIZE + self.inodes as usize * BLOCK_SIZE;
        let mut written = 0usize;
        for &block_num in block_nums {
            let remaining = data.len() - written;
            if remaining == 0 {
                break;
            }
            let chunk = remaining.min(BLOCK_SIZE);
            let dst = data_region + block_num as usize * BLOCK_SIZE;
            self.bytes[dst..dst + chunk].copy_from_slice(&data[written..written + chunk]);
            written += chunk;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.write_u32(0, self.dentries);
        self.write_u32(4, self.inodes);
        self.write_u32(8, self.data_blocks);
        self.bytes
    }
}

fn sample_image() -> Vec<u8> {
    let mut b = ImageBuilder::new(3, 3);
    b.add_dentry(b"notes", 2, 0); // regular, spans two data blocks
    b.add_dentry(b"docs", 1, 1); // directory
    b.add_dentry(b"rtc", 0, 2); // rtc device

    let mut content = Vec::new();
    content.extend(std::iter::repeat(b'a').take(BLOCK_SIZE));
    content.extend(std::iter::repeat(b'b').take(100));
    b.add_inode(0, &[0, 1], &content);
    b.add_inode(1, &[2], b"");
    b.add_inode(2, &[], b"");

    b.finish()
}

#[test]
fn lookup_finds_every_file_type() {
    let image = sample_image();
    let fs = FileSystem::new(&image).unwrap();

    assert_eq!(fs.lookup_by_name(b"notes").unwrap().inode_num, 0);
    assert_eq!(fs.lookup_by_name(b"docs").unwrap().inode_num, 1);
    assert_eq!(fs.lookup_by_name(b"rtc").unwrap().inode_num, 2);
    assert!(fs.lookup_by_name(b"missing").is_err());
}

#[test]
fn regular_file_read_crosses_data_block_boundary() {
    let image = sample_image();
    let fs = FileSystem::new(&image).unwrap();

    let mut descriptor = FileDescriptor {
        kind: FileKind::Regular,
        inode_num: 0,
        file_position: 0,
        in_use: true,
    };

    let mut buf = [0u8; BLOCK_SIZE + 100];
    let n = fd::read(&mut descriptor, &fs, 0, &mut buf).unwrap();
    assert_eq!(n, BLOCK_SIZE + 100);
    assert!(buf[..BLOCK_SIZE].iter().all(|&b| b == b'a'));
    assert!(buf[BLOCK_SIZE..].iter().all(|&b| b == b'b'));
}

#[test]
fn directory_read_yields_one_name_per_call_then_empty() {
    let image = sample_image();
    let fs = FileSystem::new(&image).unwrap();

    let mut descriptor = FileDescriptor {
        kind: FileKind::Directory,
        inode_num: 0,
        file_position: 0,
        in_use: true,
    };

    let mut names = Vec::new();
    loop {
        let mut buf = [0u8; FILENAME_LEN];
        let n = fd::read(&mut descriptor, &fs, 0, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        names.push(buf[..n].to_vec());
    }

    assert_eq!(names, vec![b"notes".to_vec(), b"docs".to_vec(), b"rtc".to_vec()]);
}

#[test]
fn regular_and_directory_descriptors_reject_writes() {
    let regular = FileDescriptor {
        kind: FileKind::Regular,
        inode_num: 0,
        file_position: 0,
        in_use: true,
    };
    let directory = FileDescriptor {
        kind: FileKind::Directory,
        inode_num: 1,
        file_position: 0,
        in_use: true,
    };

    assert_eq!(
        fd::write(&regular, 0, true, b"x").unwrap_err(),
        KernelError::ReadOnly
    );
    assert_eq!(
        fd::write(&directory, 0, true, b"x").unwrap_err(),
        KernelError::ReadOnly
    );
}

#[test]
fn corrupt_inode_index_is_reported_distinctly_from_missing_name() {
    let image = sample_image();
    let fs = FileSystem::new(&image).unwrap();

    assert_eq!(
        fs.lookup_by_name(b"nope").unwrap_err(),
        KernelError::InvalidArgument
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        fs.read_inode(99, 0, &mut buf).unwrap_err(),
        KernelError::CorruptFilesystem
    );
}
