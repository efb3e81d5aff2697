//! Archive handling
//!
//! Streaming tar extraction and single-file gzip decompression. Payloads are
//! classified by file name suffix; nothing here sniffs content beyond the
//! gzip magic bytes.

pub mod gzip;
pub mod unpack;

pub use self::gzip::{decompress_to_file, gzip_decoder};
pub use self::unpack::{ExtractReport, extract_tar};

/// How an uploaded payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Gzip-compressed tar archive (`.tar.gz`, `.tgz`)
    TarGz,
    /// Uncompressed tar archive (`.tar`)
    Tar,
    /// Single gzip-compressed file (`.gz`)
    Gzip,
    /// Anything else, stored byte for byte
    Plain,
}

impl PayloadKind {
    /// Classify a payload by its file name, ignoring case.
    pub fn classify(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            PayloadKind::TarGz
        } else if lower.ends_with(".tar") {
            PayloadKind::Tar
        } else if lower.ends_with(".gz") {
            PayloadKind::Gzip
        } else {
            PayloadKind::Plain
        }
    }

    /// Whether the payload is unpacked into the target directory.
    pub fn is_archive(&self) -> bool {
        matches!(self, PayloadKind::TarGz | PayloadKind::Tar)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::TarGz => "tar.gz",
            PayloadKind::Tar => "tar",
            PayloadKind::Gzip => "gzip",
            PayloadKind::Plain => "plain",
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    /// Builds a tar archive from `(name, contents, mode)` files and
    /// `(name, mode)` directories.
    pub fn tar_bytes(files: &[(&str, &[u8], u32)], dirs: &[(&str, u32)]) -> Vec<u8> {
        let mut builder = ::tar::Builder::new(Vec::new());
        for (name, mode) in dirs {
            let mut header = ::tar::Header::new_gnu();
            header.set_entry_type(::tar::EntryType::Directory);
            header.set_mode(*mode);
            header.set_size(0);
            builder
                .append_data(&mut header, name, std::io::empty())
                .unwrap();
        }
        for (name, data, mode) in files {
            let mut header = ::tar::Header::new_gnu();
            header.set_entry_type(::tar::EntryType::Regular);
            header.set_mode(*mode);
            header.set_size(data.len() as u64);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Builds a single-entry archive with an unchecked name, for names the
    /// tar builder refuses to write such as `../x` or `/etc/x`.
    pub fn raw_entry_tar(name: &str, entry_type: ::tar::EntryType, data: &[u8]) -> Vec<u8> {
        let mut header = ::tar::Header::new_old();
        {
            let raw = header.as_old_mut();
            raw.name[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_entry_type(entry_type);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        header.set_cksum();

        let mut builder = ::tar::Builder::new(Vec::new());
        builder.append(&header, data).unwrap();
        builder.into_inner().unwrap()
    }
}
