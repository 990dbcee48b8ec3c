//! multipart/x-mixed-replace framing

use bytes::{BufMut, Bytes, BytesMut};

use crate::Frame;

pub const BOUNDARY: &str = "frame";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const PART_TRAILER: &[u8] = b"\r\n";

/// One body part: boundary, image header, payload, CRLF.
pub fn encode(frame: &Frame) -> Bytes {
    let mut part = BytesMut::with_capacity(PART_HEADER.len() + frame.len() + PART_TRAILER.len());
    part.put_slice(PART_HEADER);
    part.put_slice(&frame.data);
    part.put_slice(PART_TRAILER);
    part.freeze()
}
