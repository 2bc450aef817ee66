//! Positional file I/O shared by file channels and the blueprint spill file.

use std::fs::File;

/// Reads `min(buf.len(), size - pos)` bytes at `pos`, treating `size` as the end of file.
pub fn read_clamped(file: &File, size: u64, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    if pos >= size || buf.is_empty() {
        return Ok(0);
    }
    let len = std::cmp::min(buf.len() as u64, size - pos) as usize;
    file_read_at_exact(file, pos, &mut buf[..len])?;
    Ok(len)
}

#[cfg(unix)]
pub fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)?;
    Ok(())
}

#[cfg(unix)]
pub fn file_write_at(file: &File, pos: u64, buf: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.write_all_at(buf, pos)
}

#[cfg(windows)]
pub fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    if !buf.is_empty() {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

#[cfg(windows)]
pub fn file_write_at(file: &File, mut pos: u64, mut buf: &[u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_write(buf, pos) {
            Ok(n) => {
                buf = &buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{file_write_at, read_clamped};

    #[test]
    fn test_read_clamped() {
        let mut file = tempfile::tempfile().expect("tempfile");
        for _ in 0..10 {
            file.write_all(b"abcdefgh").expect("write_all");
        }

        let mut buf = [0u8; 4];
        for pos in (0..80).step_by(8) {
            assert_eq!(read_clamped(&file, 80, pos, &mut buf).unwrap(), 4);
            assert_eq!(&buf, b"abcd");
        }

        let mut tail = [0u8; 16];
        assert_eq!(read_clamped(&file, 80, 76, &mut tail).unwrap(), 4);
        assert_eq!(&tail[..4], b"efgh");
        assert_eq!(read_clamped(&file, 80, 80, &mut tail).unwrap(), 0);
        // a smaller logical size hides the rest of the file
        assert_eq!(read_clamped(&file, 10, 8, &mut tail).unwrap(), 2);
    }

    #[test]
    fn test_write_at() {
        let file = tempfile::tempfile().expect("tempfile");
        file_write_at(&file, 4, b"tail").unwrap();
        file_write_at(&file, 0, b"head").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(read_clamped(&file, 8, 0, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"headtail");
    }
}
