use std::thread;

use arboard::{Clipboard, Error as ClipboardError};

use crate::error::{CoreError, CoreResult};
use crate::types::Frame;

/// Read the clipboard image as a BGRA frame.
///
/// Runs on its own thread: some clipboard backends must not be driven from
/// a thread that already owns a terminal event loop.
pub fn read_image() -> CoreResult<Option<Frame>> {
    thread::spawn(|| {
        let mut clipboard = Clipboard::new().map_err(|e| CoreError::Configuration(e.to_string()))?;
        match clipboard.get_image() {
            Ok(img) => to_frame(img.width, img.height, &img.bytes).map(Some),
            Err(ClipboardError::ContentNotAvailable) => Ok(None),
            Err(e) => Err(CoreError::Capture(e.to_string())),
        }
    })
    .join()
    .map_err(|_| CoreError::Capture("clipboard reader panicked".into()))?
}

fn to_frame(width: usize, height: usize, rgba: &[u8]) -> CoreResult<Frame> {
    let (w, h) = (u32::try_from(width), u32::try_from(height));
    match (w, h) {
        (Ok(w), Ok(h)) => Frame::from_rgba(w, h, rgba)
            .ok_or_else(|| CoreError::Capture(format!("clipboard image {}x{} is malformed", width, height))),
        _ => Err(CoreError::Capture("clipboard image is too large".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipboard_pixels_become_bgra() {
        let f = to_frame(1, 1, &[200, 100, 50, 255]).unwrap();
        assert_eq!(f.data, vec![50, 100, 200, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(matches!(to_frame(2, 2, &[0; 12]), Err(CoreError::Capture(_))));
    }
}
