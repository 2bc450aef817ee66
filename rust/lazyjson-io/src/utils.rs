/// Reads from `read` until `buffer` is full or the end of the stream is reached,
/// returning the number of bytes read.
pub fn read_fully<R: std::io::Read>(mut read: R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut pos: usize = 0;
    loop {
        let r = read.read(&mut buffer[pos..]);
        match r {
            Ok(0) => return Ok(pos),
            Ok(bytes) => {
                pos += bytes;
                if pos == buffer.len() {
                    return Ok(pos);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}
