//! Capture loop: sample → detect → decode → reassemble → poll.
//!
//! Everything runs on one thread in strict sequence per sampled image. The only time source
//! is the injected [`Clock`], read once per cycle.

use std::path::Path;
use std::time::{Duration, Instant};

use image::GrayImage;
use tracing::{error, info, warn};

use crate::capture::CaptureDevice;
use crate::codec::SymbolCodec;
use crate::reassembler::{FrameOutcome, LossPolicy, Reassembler, SessionReport};
use crate::{decode_wire, stream_digest, Result, TransferError};

pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct Receiver<C, K = SystemClock> {
    codec: C,
    clock: K,
    session: Reassembler,
    samples: u64,
}

impl<C: SymbolCodec> Receiver<C, SystemClock> {
    pub fn new(codec: C, inactivity: Duration, policy: LossPolicy) -> Self {
        Self::with_clock(codec, SystemClock, inactivity, policy)
    }
}

impl<C: SymbolCodec, K: Clock> Receiver<C, K> {
    pub fn with_clock(codec: C, clock: K, inactivity: Duration, policy: LossPolicy) -> Self {
        Receiver {
            codec,
            clock,
            session: Reassembler::new(inactivity, policy),
            samples: 0,
        }
    }

    /// Handle one sampled image observed at `now`.
    ///
    /// Returns `None` when the image carried no usable symbol.
    pub fn ingest(&mut self, image: &GrayImage, now: Instant) -> Result<Option<FrameOutcome>> {
        self.samples += 1;
        let detections = self.codec.detect(image)?;

        if detections.len() > 1 {
            self.session.record_ambiguous();
            let err = TransferError::AmbiguousDetection {
                count: detections.len(),
            };
            warn!(error = %err, "only expecting one symbol, choosing the first");
        }

        let Some(detection) = detections.into_iter().next() else {
            return Ok(None);
        };

        match decode_wire(&detection.data) {
            Ok(frame) => Ok(Some(self.session.accept(frame, now)?)),
            Err(e) => {
                self.session.record_corrupt();
                warn!(error = %e, "skipping undecodable symbol");
                Ok(None)
            }
        }
    }

    /// Pull images from `device` until the session finalizes or the feed ends.
    pub fn run(&mut self, device: &mut dyn CaptureDevice) -> Result<()> {
        info!("beginning capture");
        loop {
            let Some(image) = device.next_frame()? else {
                info!("capture feed ended, finalizing");
                self.session.finalize();
                break;
            };

            let now = self.clock.now();
            if let Err(e) = self.ingest(&image, now) {
                error!(error = %e, "capture session aborted");
                return Err(e);
            }
            if self.session.poll(now) {
                break;
            }
        }

        if self.session.buffer().is_empty() {
            warn!(samples = self.samples, "session ended without capturing any frame");
        }
        Ok(())
    }

    pub fn session(&self) -> &Reassembler {
        &self.session
    }

    pub fn report(&self) -> SessionReport {
        self.session.report()
    }

    pub fn into_stream(self) -> Vec<u8> {
        self.session.into_stream()
    }
}

/// Write the reassembled stream to `dest`, creating or truncating it.
pub fn write_stream(dest: &Path, stream: &[u8]) -> Result<()> {
    std::fs::write(dest, stream)?;
    info!(
        path = %dest.display(),
        bytes = stream.len(),
        digest = %format!("{:#018x}", stream_digest(stream)),
        "stream written"
    );
    Ok(())
}

/// Write `report` to `dest` as pretty-printed JSON.
pub fn write_report(dest: &Path, report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(dest, json)?;
    info!(path = %dest.display(), "session report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Detection;
    use crate::{encode_wire, Frame};
    use image::Luma;
    use std::cell::Cell;

    /// Each image row is one symbol: `[len, bytes..]`. Rows with `len == 0` are empty.
    struct RowCodec;

    impl RowCodec {
        fn image(symbols: &[&[u8]]) -> GrayImage {
            let width = symbols.iter().map(|s| s.len() + 1).max().unwrap_or(1) as u32;
            let height = symbols.len().max(1) as u32;
            let mut img = GrayImage::from_pixel(width, height, Luma([0u8]));
            for (y, sym) in symbols.iter().enumerate() {
                img.put_pixel(0, y as u32, Luma([sym.len() as u8]));
                for (x, b) in sym.iter().enumerate() {
                    img.put_pixel(x as u32 + 1, y as u32, Luma([*b]));
                }
            }
            img
        }

        fn frame_image(index: u64, payload: &[u8]) -> GrayImage {
            Self::image(&[encode_wire(index, payload).as_bytes()])
        }

        fn blank() -> GrayImage {
            Self::image(&[])
        }
    }

    impl SymbolCodec for RowCodec {
        fn render(&self, wire: &[u8]) -> Result<GrayImage> {
            Ok(Self::image(&[wire]))
        }

        fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>> {
            let mut found = Vec::new();
            for y in 0..image.height() {
                let len = image.get_pixel(0, y).0[0] as u32;
                if len == 0 {
                    continue;
                }
                let data = (1..=len).map(|x| image.get_pixel(x, y).0[0]).collect();
                found.push(Detection {
                    data,
                    boundary: vec![(0, y as i32), (len as i32, y as i32)],
                });
            }
            Ok(found)
        }
    }

    /// Advances by `step` every time it is read.
    struct StepClock {
        now: Cell<Instant>,
        step: Duration,
    }

    impl StepClock {
        fn new(step: Duration) -> Self {
            StepClock {
                now: Cell::new(Instant::now()),
                step,
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            let t = self.now.get();
            self.now.set(t + self.step);
            t
        }
    }

    /// Scripted images, then blank samples forever.
    struct ScriptedDevice {
        script: Vec<GrayImage>,
        served: usize,
    }

    impl CaptureDevice for ScriptedDevice {
        fn next_frame(&mut self) -> Result<Option<GrayImage>> {
            let img = self
                .script
                .get(self.served)
                .cloned()
                .unwrap_or_else(RowCodec::blank);
            self.served += 1;
            Ok(Some(img))
        }
    }

    fn receiver(step_ms: u64, policy: LossPolicy) -> Receiver<RowCodec, StepClock> {
        Receiver::with_clock(
            RowCodec,
            StepClock::new(Duration::from_millis(step_ms)),
            Duration::from_secs(2),
            policy,
        )
    }

    #[test]
    fn test_finalizes_on_silence_with_live_feed() {
        let mut rx = receiver(500, LossPolicy::LogAndContinue);
        let mut dev = ScriptedDevice {
            script: vec![
                RowCodec::frame_image(0, b"HE"),
                RowCodec::frame_image(0, b"HE"),
                RowCodec::frame_image(1, b"LL"),
                RowCodec::frame_image(2, b"O"),
                RowCodec::frame_image(2, b"O"),
            ],
            served: 0,
        };

        rx.run(&mut dev).unwrap();

        assert!(rx.session().is_finalized());
        // last frame at sample 4 (t = 1500ms); first poll over 2s of silence at t = 4000ms
        assert_eq!(dev.served, 9);
        let report = rx.report();
        assert_eq!(report.frames_accepted, 3);
        assert_eq!(report.duplicates_suppressed, 2);
        assert!(report.ordering_anomalies.is_empty());
        assert_eq!(rx.into_stream(), b"HELLO");
    }

    #[test]
    fn test_feed_end_finalizes() {
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        let images = vec![
            RowCodec::frame_image(0, b"HEL"),
            RowCodec::frame_image(1, b"LO"),
        ];
        let mut dev = crate::capture::ImageSequenceDevice::from_images(images, 4).unwrap();

        rx.run(&mut dev).unwrap();

        assert!(rx.session().is_finalized());
        assert_eq!(rx.report().duplicates_suppressed, 6);
        assert_eq!(rx.into_stream(), b"HELLO");
    }

    #[test]
    fn test_ambiguous_sample_uses_first_symbol() {
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        let first = encode_wire(0, b"first");
        let second = encode_wire(1, b"second");
        let img = RowCodec::image(&[first.as_bytes(), second.as_bytes()]);

        let outcome = rx.ingest(&img, Instant::now()).unwrap();

        assert_eq!(outcome, Some(FrameOutcome::Appended { anomaly: None }));
        assert_eq!(rx.session().buffer(), b"first");
        assert_eq!(rx.report().ambiguous_samples, 1);
    }

    #[test]
    fn test_corrupt_symbol_is_skipped() {
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        let img = RowCodec::image(&[b"%%%not-base64%%%".as_slice()]);

        assert_eq!(rx.ingest(&img, Instant::now()).unwrap(), None);
        assert_eq!(rx.report().corrupt_detections, 1);
        assert!(rx.session().buffer().is_empty());
    }

    #[test]
    fn test_blank_sample_yields_nothing() {
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        assert_eq!(rx.ingest(&RowCodec::blank(), Instant::now()).unwrap(), None);
    }

    #[test]
    fn test_gap_is_logged_and_kept() {
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        let t = Instant::now();
        for (i, p) in [(0u64, b"a"), (1, b"b"), (3, b"d")] {
            rx.ingest(&RowCodec::frame_image(i, p), t).unwrap();
        }

        let report = rx.report();
        assert_eq!(report.ordering_anomalies.len(), 1);
        assert_eq!(report.ordering_anomalies[0].previous, 1);
        assert_eq!(report.ordering_anomalies[0].current, 3);
        assert_eq!(report.missing_ranges, vec![(2, 2)]);
        assert_eq!(rx.into_stream(), b"abd");
    }

    #[test]
    fn test_fail_fast_aborts_run() {
        let mut rx = receiver(10, LossPolicy::FailFast);
        let mut dev = ScriptedDevice {
            script: vec![RowCodec::frame_image(0, b"a"), RowCodec::frame_image(5, b"f")],
            served: 0,
        };

        assert!(matches!(
            rx.run(&mut dev),
            Err(TransferError::OrderingAnomaly {
                expected: 1,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_render_matches_detect() {
        let codec = RowCodec;
        let frame = Frame::new(9, b"xyz".to_vec());
        let img = codec.render(frame.to_wire().as_bytes()).unwrap();
        let found = codec.detect(&img).unwrap();
        assert_eq!(decode_wire(&found[0].data).unwrap(), frame);
    }

    #[test]
    fn test_write_stream_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out.bin");
        std::fs::write(&dest, b"old contents that are longer").unwrap();

        write_stream(&dest, b"HELLO").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"HELLO");
    }

    #[test]
    fn test_write_report_as_json() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("report.json");
        let mut rx = receiver(10, LossPolicy::LogAndContinue);
        let t = Instant::now();
        rx.ingest(&RowCodec::frame_image(0, b"a"), t).unwrap();
        rx.ingest(&RowCodec::image(&[b"%%%".as_slice()]), t).unwrap();
        rx.ingest(&RowCodec::frame_image(2, b"c"), t).unwrap();

        write_report(&dest, &rx.report()).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&dest).unwrap()).unwrap();
        assert_eq!(json["frames_accepted"], 2);
        assert_eq!(json["corrupt_detections"], 1);
        assert_eq!(json["missing_ranges"][0][0], 1);
        assert_eq!(json["ordering_anomalies"][0]["current"], 2);
    }

    #[test]
    fn test_write_report_missing_dir_is_io_error() {
        let report = receiver(10, LossPolicy::LogAndContinue).report();
        let result = write_report(Path::new("/no/such/dir/report.json"), &report);
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
