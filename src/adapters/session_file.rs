//! Raw PCM session files: little-endian f32 samples written sequentially.
//!
//! Container framing (headers, chunking) is the collaborator's concern; the
//! pipeline only needs "write float samples sequentially" and the inverse.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::domain::DomainError;

/// Incremental session-file writer used by the capture loop.
pub struct SessionFileWriter {
    writer: BufWriter<File>,
    samples_written: usize,
}

impl SessionFileWriter {
    /// Create (or truncate) the session file at `path`.
    pub fn create(path: &Path) -> Result<Self, DomainError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            samples_written: 0,
        })
    }

    /// Append one batch of samples.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<(), DomainError> {
        for sample in samples {
            self.writer.write_all(&sample.to_le_bytes())?;
        }
        self.samples_written += samples.len();
        Ok(())
    }

    /// Flush buffered samples and close the file.
    pub fn finalize(mut self) -> Result<usize, DomainError> {
        self.writer.flush()?;
        Ok(self.samples_written)
    }
}

/// Read a whole session file back as samples.
pub fn read_samples(path: &Path) -> Result<Vec<f32>, DomainError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() % 4 != 0 {
        return Err(DomainError::Io(format!(
            "Session file {} is truncated mid-sample",
            path.display()
        )));
    }

    let mut samples = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        samples.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_session_file_write_then_read() {
        let dir = std::env::temp_dir().join("sussurro_session_file_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.pcm");

        let mut writer = SessionFileWriter::create(&path).unwrap();
        writer.write_samples(&[0.0, 0.5, -0.5]).unwrap();
        writer.write_samples(&[1.0]).unwrap();
        assert_eq!(writer.finalize().unwrap(), 4);

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -0.5, 1.0]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = std::env::temp_dir().join("sussurro_session_truncated_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.pcm");
        fs::write(&path, [0u8; 6]).unwrap();

        assert!(matches!(read_samples(&path), Err(DomainError::Io(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(read_samples(Path::new("/nonexistent/session.pcm")).is_err());
    }
}
