use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use crate::vis::overlay::OverlayImage;

/// Display capability injected into the loss engine.
///
/// The engine holds at most one sink and never assumes a real display
/// surface exists; headless runs substitute [`NoopSink`]. Implementations
/// must not mutate anything the loss computation reads.
pub trait DisplaySink {
    /// Presents `image` on the surface identified by `name` (a window
    /// title, a file stem, a stream id).
    fn show(&mut self, name: &str, image: &OverlayImage) -> io::Result<()>;

    /// Blocks until the viewer acknowledges the frame (the keypress
    /// equivalent). Non-interactive sinks return immediately.
    fn wait_for_acknowledgement(&mut self);
}

/// Sink that discards every frame. For headless runs and tests.
#[derive(Debug, Default)]
pub struct NoopSink;

impl DisplaySink for NoopSink {
    fn show(&mut self, _name: &str, _image: &OverlayImage) -> io::Result<()> {
        Ok(())
    }

    fn wait_for_acknowledgement(&mut self) {}
}

/// Sink that writes each frame as a numbered PNG under a directory:
/// `show("overlay", ..)` produces `overlay-0000.png`, `overlay-0001.png`,
/// and so on, counted per name.
#[derive(Debug)]
pub struct PngDirSink {
    dir: PathBuf,
    next_index: HashMap<String, u32>,
}

impl PngDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> PngDirSink {
        PngDirSink {
            dir: dir.into(),
            next_index: HashMap::new(),
        }
    }
}

impl DisplaySink for PngDirSink {
    fn show(&mut self, name: &str, image: &OverlayImage) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let index = self.next_index.entry(name.to_owned()).or_insert(0);
        let path = self.dir.join(format!("{}-{:04}.png", name, index));
        *index += 1;
        image
            .save(&path)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn wait_for_acknowledgement(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn png_dir_sink_writes_decodable_numbered_files() {
        let dir = std::env::temp_dir().join(format!("hematite-sink-{}", std::process::id()));
        let mut sink = PngDirSink::new(&dir);

        let image = OverlayImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        sink.show("overlay", &image).unwrap();
        sink.show("overlay", &image).unwrap();
        sink.show("context", &image).unwrap();

        let first = dir.join("overlay-0000.png");
        let second = dir.join("overlay-0001.png");
        let context = dir.join("context-0000.png");
        assert!(first.exists() && second.exists() && context.exists());

        let decoded = image::open(&first).unwrap().to_rgb8();
        assert_eq!(*decoded.get_pixel(2, 2), Rgb([10, 20, 30]));

        std::fs::remove_dir_all(&dir).ok();
    }
}
