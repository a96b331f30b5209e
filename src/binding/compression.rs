//! Compression detection for tar containers.
//!
//! A container's outer compression is identified by its leading magic bytes.
//! Everything that matches no signature is treated as a plain tar stream and
//! validated later by the tar header check.

use std::io::{self, BufRead, Read};

/// Outer compression of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Compression {
    /// Plain tar.
    None,
    /// gzip (`.tar.gz`, `.tgz`).
    Gzip,
    /// bzip2 (`.tar.bz2`).
    Bzip2,
    /// Zstandard (`.tar.zst`).
    Zstd,
    /// XZ (`.tar.xz`).
    Xz,
}

/// Known compression signatures.
const SIGNATURES: &[(&[u8], Compression)] = &[
    // gzip: 0x1F 0x8B
    (&[0x1F, 0x8B], Compression::Gzip),
    // bzip2: 'B' 'Z' 'h'
    (&[0x42, 0x5A, 0x68], Compression::Bzip2),
    // Zstd: 0x28 0xB5 0x2F 0xFD
    (&[0x28, 0xB5, 0x2F, 0xFD], Compression::Zstd),
    // XZ: 0xFD '7' 'z' 'X' 'Z' 0x00
    (&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], Compression::Xz),
];

impl Compression {
    /// Identifies the compression from the first bytes of a container.
    pub fn detect(prefix: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(signature, _)| prefix.starts_with(signature))
            .map(|(_, compression)| *compression)
            .unwrap_or(Compression::None)
    }

    /// Returns a human-readable name for this compression.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zstd => "zstd",
            Compression::Xz => "xz",
        }
    }

    /// Returns whether this build can decode the compression.
    pub fn is_enabled(&self) -> bool {
        match self {
            Compression::None => true,
            Compression::Gzip => cfg!(feature = "gzip"),
            Compression::Bzip2 => cfg!(feature = "bzip2"),
            Compression::Zstd => cfg!(feature = "zstd"),
            Compression::Xz => cfg!(feature = "xz"),
        }
    }

    /// Wraps `reader` in the matching decompressor.
    ///
    /// Multi-member gzip, bzip2 and xz streams are decoded as one stream.
    pub(crate) fn wrap<R>(self, reader: R) -> io::Result<Box<dyn Read + Send>>
    where
        R: BufRead + Send + 'static,
    {
        match self {
            Compression::None => Ok(Box::new(reader)),
            #[cfg(feature = "gzip")]
            Compression::Gzip => Ok(Box::new(flate2::bufread::MultiGzDecoder::new(reader))),
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => Ok(Box::new(bzip2::bufread::MultiBzDecoder::new(reader))),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Ok(Box::new(zstd::stream::read::Decoder::with_buffer(
                reader,
            )?)),
            #[cfg(feature = "xz")]
            Compression::Xz => Ok(Box::new(xz2::bufread::XzDecoder::new_multi_decoder(
                reader,
            ))),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} decompression is not enabled in this build", other.name()),
            )),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_signatures() {
        assert_eq!(Compression::detect(&[0x1F, 0x8B, 0x08]), Compression::Gzip);
        assert_eq!(Compression::detect(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::detect(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]),
            Compression::Zstd
        );
        assert_eq!(
            Compression::detect(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]),
            Compression::Xz
        );
    }

    #[test]
    fn test_detect_falls_back_to_plain() {
        assert_eq!(Compression::detect(b"hello.txt\0\0\0"), Compression::None);
        assert_eq!(Compression::detect(&[]), Compression::None);
        // A lone gzip magic byte is not enough.
        assert_eq!(Compression::detect(&[0x1F]), Compression::None);
    }

    #[cfg(not(feature = "xz"))]
    #[test]
    fn test_xz_requires_feature() {
        assert!(!Compression::Xz.is_enabled());
        let err = match Compression::Xz.wrap(io::Cursor::new(Vec::new())) {
            Ok(_) => panic!("xz is not enabled"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[cfg(feature = "xz")]
    #[test]
    fn test_xz_wrap_roundtrip() {
        use std::io::Write;

        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(b"payload").unwrap();
        let bytes = encoder.finish().unwrap();
        assert_eq!(Compression::detect(&bytes), Compression::Xz);

        let mut reader = Compression::Xz.wrap(io::Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "payload");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gzip_wrap_roundtrip() {
        use std::io::Write;

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        let bytes = encoder.finish().unwrap();

        let mut reader = Compression::Gzip.wrap(io::Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "payload");
    }
}
