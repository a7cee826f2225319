//! Some files come as RMID: a Standard Midi File embedded in a RIFF container.
//! These are supported by unwrapping the input slice down to the raw SMF bytes.

use crate::prelude::*;

/// Iterate over the `(id, data)` chunks of a RIFF body.
///
/// RIFF chunk lengths are little-endian, and odd-sized chunks are padded to an even length.
struct ChunkIter<'a>(&'a [u8]);
impl<'a> Iterator for ChunkIter<'a> {
    type Item = (&'a [u8], &'a [u8]);
    fn next(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let id = self.0.split_checked(4)?;
        let len = self.0.split_checked(4)?;
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        let data = match self.0.split_checked(len) {
            Some(data) => data,
            None => mem::replace(&mut self.0, &[]),
        };
        if len % 2 == 1 {
            let _pad = self.0.split_checked(1);
        }
        Some((id, data))
    }
}

/// Get the SMF data out of an RMID file.
///
/// Fails if `raw` is not an RMID file at all.
pub(crate) fn unwrap(raw: &[u8]) -> ParseResult<&[u8]> {
    let (id, mut riff) = ChunkIter(raw)
        .next()
        .ok_or(err_invalid!("no main riff chunk"))?;
    ensure!(id == b"RIFF", err_invalid!("invalid main riff chunk"));
    let formtype = riff
        .split_checked(4)
        .ok_or(err_invalid!("failed to read riff formtype"))?;
    ensure!(formtype == b"RMID", err_invalid!("not an rmid riff file"));
    ChunkIter(riff)
        .find(|(id, _)| *id == b"data")
        .map(|(_, data)| data)
        .ok_or_else(|| err_invalid!("no rmid data chunk").into())
}
