use super::{AnnotatedFrame, DisplayStatus};
use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::frame::FrameData;
use crate::pose::JointTriple;
use tracing::{debug, warn};

#[cfg(feature = "overlay")]
use image::{Rgb, RgbImage};
#[cfg(feature = "overlay")]
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut,
};
#[cfg(feature = "overlay")]
use imageproc::rect::Rect;
#[cfg(feature = "overlay")]
use rusttype::{Font, Scale};
#[cfg(feature = "overlay")]
use std::sync::Arc;

#[cfg(feature = "overlay")]
const STATUS_BOX: Rgb<u8> = Rgb([16, 117, 245]);
#[cfg(feature = "overlay")]
const LABEL: Rgb<u8> = Rgb([0, 0, 0]);
#[cfg(feature = "overlay")]
const VALUE: Rgb<u8> = Rgb([255, 255, 255]);
#[cfg(feature = "overlay")]
const JOINT: Rgb<u8> = Rgb([66, 117, 245]);
#[cfg(feature = "overlay")]
const SEGMENT: Rgb<u8> = Rgb([230, 66, 245]);

/// Draws the REPS/STAGE status box and the measured leg onto RGB24 frames.
///
/// Frames without drawable pixels are passed through untouched, so replayed landmark streams
/// and foreign pixel formats still reach the display.
pub struct OverlayRenderer {
    enabled: bool,
    #[cfg(feature = "overlay")]
    font: Option<Arc<Font<'static>>>,
    #[cfg(feature = "overlay")]
    font_size: f32,
}

impl OverlayRenderer {
    /// Create a renderer. A font that cannot be loaded disables the text, not the overlay.
    pub fn new(config: &OverlayConfig) -> Self {
        #[cfg(feature = "overlay")]
        {
            let font = if config.enabled {
                match load_font(&config.font_path) {
                    Ok(font) => Some(Arc::new(font)),
                    Err(e) => {
                        warn!("{}; overlay text disabled", e);
                        None
                    }
                }
            } else {
                None
            };

            Self {
                enabled: config.enabled,
                font,
                font_size: config.font_size,
            }
        }

        #[cfg(not(feature = "overlay"))]
        {
            if config.enabled {
                warn!("Overlay feature not enabled - frames are displayed without annotation");
            }
            Self { enabled: false }
        }
    }

    /// Renderer that never draws
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            #[cfg(feature = "overlay")]
            font: None,
            #[cfg(feature = "overlay")]
            font_size: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Produce the frame to display for `status`, drawing `joints` when present
    pub fn annotate(
        &self,
        frame: FrameData,
        status: &DisplayStatus,
        joints: Option<&JointTriple>,
    ) -> AnnotatedFrame {
        if !self.enabled || !frame.has_pixels() {
            return AnnotatedFrame::passthrough(frame);
        }

        match self.draw(&frame, status, joints) {
            Ok(annotated) => annotated,
            Err(e) => {
                debug!("Frame {} displayed without overlay: {}", frame.id, e);
                AnnotatedFrame::passthrough(frame)
            }
        }
    }

    #[cfg(feature = "overlay")]
    fn draw(
        &self,
        frame: &FrameData,
        status: &DisplayStatus,
        joints: Option<&JointTriple>,
    ) -> Result<AnnotatedFrame, OverlayError> {
        let (width, height) = (frame.width, frame.height);
        let mut img = RgbImage::from_raw(width, height, frame.data.as_ref().clone())
            .ok_or(OverlayError::FrameLayout { width, height })?;

        if let Some(joints) = joints {
            let hip = joints.hip.to_pixels(width, height);
            let knee = joints.knee.to_pixels(width, height);
            let ankle = joints.ankle.to_pixels(width, height);

            draw_line_segment_mut(&mut img, hip, knee, SEGMENT);
            draw_line_segment_mut(&mut img, knee, ankle, SEGMENT);
            for (x, y) in [hip, knee, ankle] {
                draw_filled_circle_mut(&mut img, (x as i32, y as i32), 3, JOINT);
            }
        }

        let box_width = 225.min(width);
        let box_height = 73.min(height);
        draw_filled_rect_mut(
            &mut img,
            Rect::at(0, 0).of_size(box_width, box_height),
            STATUS_BOX,
        );

        if let Some(font) = self.font.as_deref() {
            let label_scale = Scale::uniform(self.font_size * 0.4);
            let value_scale = Scale::uniform(self.font_size);

            draw_text_mut(&mut img, LABEL, 15, 4, label_scale, font, "REPS");
            draw_text_mut(&mut img, LABEL, 70, 4, label_scale, font, "STAGE");
            draw_text_mut(
                &mut img,
                VALUE,
                10,
                22,
                value_scale,
                font,
                &status.count.to_string(),
            );
            draw_text_mut(
                &mut img,
                VALUE,
                65,
                22,
                value_scale,
                font,
                &status.stage.to_string(),
            );
        }

        let annotated = FrameData {
            data: Arc::new(img.into_raw()),
            ..frame.clone()
        };

        Ok(AnnotatedFrame {
            frame: annotated,
            annotated: true,
        })
    }

    #[cfg(not(feature = "overlay"))]
    fn draw(
        &self,
        frame: &FrameData,
        _status: &DisplayStatus,
        _joints: Option<&JointTriple>,
    ) -> Result<AnnotatedFrame, OverlayError> {
        Ok(AnnotatedFrame::passthrough(frame.clone()))
    }
}

#[cfg(feature = "overlay")]
fn load_font(path: &str) -> Result<Font<'static>, OverlayError> {
    let font_data = std::fs::read(path).map_err(|e| OverlayError::Font {
        path: path.to_string(),
        details: e.to_string(),
    })?;

    Font::try_from_vec(font_data).ok_or_else(|| OverlayError::Font {
        path: path.to_string(),
        details: "not a TrueType font".to_string(),
    })
}
