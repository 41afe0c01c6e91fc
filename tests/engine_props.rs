//! Property-based tests for the capture engine
//!
//! Every engine call runs against the synthetic display, whose resource
//! counters show whether a context leaked or wrote where it should not.

use framegrab::engine::CaptureContext;
use framegrab::errors::CaptureError;
use framegrab::testing::{pattern_pixel, AcquireStage, SyntheticDisplay};
use framegrab::types::Geometry;
use proptest::prelude::*;

fn display() -> SyntheticDisplay {
    SyntheticDisplay::new(Geometry::new(1920, 1080).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Repeated init/release cycles leave no resource behind
    #[test]
    fn init_release_cycles_do_not_leak(
        width in 1i32..256,
        height in 1i32..256,
        cycles in 1usize..8,
    ) {
        let display = display();
        for _ in 0..cycles {
            let mut ctx = CaptureContext::init_with(&display, width, height).unwrap();
            prop_assert_eq!(display.live_resources(), 3);
            ctx.release();
            prop_assert_eq!(display.live_resources(), 0);
        }
    }

    /// Non-positive dimensions never acquire anything
    #[test]
    fn non_positive_dimensions_fail(
        width in -4096i32..=0,
        height in -4096i32..4096,
        swap in any::<bool>(),
    ) {
        let display = display();
        let (w, h) = if swap { (height, width) } else { (width, height) };
        let result = CaptureContext::init_with(&display, w, h);
        prop_assert!(matches!(result, Err(CaptureError::InvalidGeometry(_))));
        prop_assert_eq!(display.live_resources(), 0);
    }

    /// An undersized buffer is never written
    #[test]
    fn undersized_buffer_is_untouched(
        width in 1i32..64,
        height in 1i32..64,
        shortfall in 1usize..64,
        fill in any::<u8>(),
    ) {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, width, height).unwrap();
        let len = ctx.expected_buffer_size().saturating_sub(shortfall);
        let mut buffer = vec![fill; len];

        let result = ctx.grab_frame(&mut buffer);
        prop_assert!(matches!(result, Err(CaptureError::PreconditionViolation(_))));
        prop_assert!(buffer.iter().all(|b| *b == fill));
    }

    /// A large enough buffer receives exactly w*h*4 bytes in B,G,R,A order
    #[test]
    fn frame_layout_is_top_down_bgra(
        width in 1i32..48,
        height in 1i32..48,
        slack in 0usize..32,
    ) {
        let display = display();
        let mut ctx = CaptureContext::init_with(&display, width, height).unwrap();
        let expected = (width * height * 4) as usize;
        prop_assert_eq!(ctx.expected_buffer_size(), expected);

        let mut buffer = vec![0x5Au8; expected + slack];
        ctx.grab_frame(&mut buffer).unwrap();

        for y in 0..height as u32 {
            for x in 0..width as u32 {
                let offset = (y * width as u32 * 4 + x * 4) as usize;
                prop_assert_eq!(&buffer[offset..offset + 4], &pattern_pixel(x, y, 1)[..]);
            }
        }
        prop_assert!(buffer[expected..].iter().all(|b| *b == 0x5A));
    }
}

#[test]
fn full_hd_frame_scenario() {
    let display = display();
    let mut ctx = CaptureContext::init_with(&display, 1920, 1080).unwrap();
    let mut buffer = vec![0u8; 1920 * 1080 * 4];

    ctx.grab_frame(&mut buffer).unwrap();
    // Alpha is opaque everywhere, so every pixel was written
    assert!(buffer.chunks_exact(4).all(|px| px[3] == 0xFF));

    ctx.release();
    assert!(matches!(
        ctx.grab_frame(&mut buffer),
        Err(CaptureError::PreconditionViolation(_))
    ));
}

#[test]
fn acquisition_failure_at_each_stage_unwinds() {
    for stage in [
        AcquireStage::DisplaySource,
        AcquireStage::CompatibleSurface,
        AcquireStage::PixelBitmap,
    ] {
        let display = display();
        display.fail_acquisition_at(Some(stage));
        let result = CaptureContext::init_with(&display, 640, 480);
        assert!(
            matches!(result, Err(CaptureError::ResourceAcquisitionFailure(_))),
            "stage {:?}",
            stage
        );
        assert_eq!(display.live_resources(), 0, "stage {:?}", stage);
    }
}

#[test]
fn frames_convert_to_rgba_images() {
    let display = display();
    let mut ctx = CaptureContext::init_with(&display, 4, 2).unwrap();
    let mut buffer = vec![0u8; ctx.expected_buffer_size()];
    ctx.grab_frame(&mut buffer).unwrap();

    let image = framegrab::types::bgra_to_rgba_image(ctx.geometry(), &buffer).unwrap();
    let [b, g, r, a] = pattern_pixel(3, 1, 1);
    assert_eq!(image.get_pixel(3, 1).0, [r, g, b, a]);
}
