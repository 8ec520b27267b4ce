// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use common::StubHost;
use edgevision_rt::{
    gateway::{process_frame, FrameProcessor, ProcessingError},
    image::{FrameDimensions, PixelFormat},
    kernel::{CannyParams, KernelError, ProcessingMode},
    lease::HostError,
};
use std::thread;

mod common;

#[test]
fn test_grayscale_frame() {
    let input = StubHost::rgba(2, 1, vec![30, 60, 90, 0, 255, 0, 0, 7]);
    let output = StubHost::zeroed(2, 1);

    process_frame(&input, &output, ProcessingMode::Grayscale).unwrap();

    assert_eq!(output.pixels(), vec![60, 60, 60, 255, 85, 85, 85, 255]);
    assert!(input.balanced() && output.balanced());
    assert_eq!((input.acquires(), output.acquires()), (1, 1));
}

#[test]
fn test_every_mode_releases_leases() {
    let processor = FrameProcessor::default();
    for mode in ProcessingMode::ALL {
        let input = StubHost::rgba(16, 12, common::noise(16, 12, mode as u32));
        let output = StubHost::zeroed(16, 12);

        processor.process(&input, &output, mode).unwrap();
        assert!(input.balanced() && output.balanced(), "{mode}");
        assert_eq!(output.releases(), 1, "{mode}");
    }
}

#[test]
fn test_dimension_mismatch() {
    let input = StubHost::filled(4, 4, [9, 9, 9, 9]);
    let output = StubHost::filled(4, 3, [1, 2, 3, 4]);

    let err = process_frame(&input, &output, ProcessingMode::Passthrough).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::DimensionMismatch {
            input: (4, 4),
            output: (4, 3)
        }
    );
    assert_eq!(err.to_string(), "dimension mismatch: input 4x4, output 4x3");

    assert!(input.balanced() && output.balanced());
    assert_eq!(output.pixels(), [1u8, 2, 3, 4].repeat(12));
}

#[test]
fn test_negative_dimensions() {
    let input = StubHost::with_metadata(-4, 4, 16, PixelFormat::Rgba8888, 64);
    let output = StubHost::with_metadata(-4, 4, 16, PixelFormat::Rgba8888, 64);

    let err = process_frame(&input, &output, ProcessingMode::Grayscale).unwrap_err();
    assert!(matches!(err, ProcessingError::DimensionMismatch { .. }));
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_metadata_failure_takes_no_leases() {
    for failing_input in [true, false] {
        let mut input = StubHost::zeroed(3, 3);
        let mut output = StubHost::zeroed(3, 3);
        input.fail_metadata = failing_input;
        output.fail_metadata = !failing_input;

        let err = process_frame(&input, &output, ProcessingMode::EdgeDetect).unwrap_err();
        assert!(matches!(err, ProcessingError::MetadataUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!((input.acquires(), output.acquires()), (0, 0));
    }
}

#[test]
fn test_input_lease_denied() {
    let mut input = StubHost::zeroed(3, 3);
    input.deny_lease = true;
    let output = StubHost::zeroed(3, 3);

    let err = process_frame(&input, &output, ProcessingMode::Grayscale).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::LeaseAcquisitionFailed(HostError::new(-13, "lease denied"))
    );
    assert_eq!((input.acquires(), output.acquires()), (0, 0));
}

#[test]
fn test_output_lease_denied_releases_input() {
    let input = StubHost::zeroed(3, 3);
    let mut output = StubHost::zeroed(3, 3);
    output.deny_lease = true;

    let err = process_frame(&input, &output, ProcessingMode::Grayscale).unwrap_err();
    assert!(matches!(err, ProcessingError::LeaseAcquisitionFailed(_)));
    assert_eq!((input.acquires(), input.releases()), (1, 1));
    assert_eq!(output.acquires(), 0);
}

#[test]
fn test_null_pixels_rejected() {
    let mut input = StubHost::zeroed(2, 2);
    input.return_null = true;
    let output = StubHost::zeroed(2, 2);

    let err = process_frame(&input, &output, ProcessingMode::Grayscale).unwrap_err();
    assert!(matches!(err, ProcessingError::LeaseAcquisitionFailed(_)));
    assert!(input.balanced());
    assert_eq!(input.acquires(), 1);
    assert_eq!(output.acquires(), 0);
}

#[test]
fn test_unsupported_format() {
    let input = StubHost::zeroed(4, 2);
    let output = StubHost::with_metadata(4, 2, 8, PixelFormat::Rgb565, 16);

    let err = process_frame(&input, &output, ProcessingMode::Grayscale).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::UnsupportedFormat {
            format: PixelFormat::Rgb565,
            stride: 8
        }
    );
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_padded_rows_rejected() {
    let input = StubHost::zeroed(4, 2);
    let output = StubHost::with_metadata(4, 2, 20, PixelFormat::Rgba8888, 40);

    let err = process_frame(&input, &output, ProcessingMode::Passthrough).unwrap_err();
    assert!(matches!(err, ProcessingError::UnsupportedFormat { stride: 20, .. }));
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_short_lease() {
    let input = StubHost::zeroed(4, 4);
    let mut output = StubHost::zeroed(4, 4);
    output.lease_len = Some(60);

    let err = process_frame(&input, &output, ProcessingMode::Passthrough).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::BufferTooSmall {
            expected: 64,
            actual: 60
        }
    );
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_unknown_mode_falls_back_to_grayscale() {
    let src = common::noise(5, 5, 11);
    let input = StubHost::rgba(5, 5, src.clone());
    let fallback = StubHost::zeroed(5, 5);
    let expected = StubHost::zeroed(5, 5);

    process_frame(&input, &fallback, ProcessingMode::from_raw(17)).unwrap();
    process_frame(&input, &expected, ProcessingMode::Grayscale).unwrap();

    assert_eq!(fallback.pixels(), expected.pixels());
    assert_eq!(input.acquires(), input.releases());
}

#[test]
fn test_kernel_panic_is_contained() {
    let input = StubHost::zeroed(3, 3);
    let output = StubHost::zeroed(3, 3);

    let err = FrameProcessor::default()
        .process_with(&input, &output, |_, _, _| panic!("bad pixel"))
        .unwrap_err();

    assert_eq!(err, ProcessingError::KernelFault("bad pixel".to_string()));
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_kernel_error_is_fault() {
    let input = StubHost::zeroed(3, 3);
    let output = StubHost::zeroed(3, 3);

    let err = FrameProcessor::default()
        .process_with(&input, &output, |src, _, _| {
            Err(KernelError::SizeMismatch {
                expected: 0,
                actual: src.len(),
            })
        })
        .unwrap_err();

    assert!(matches!(err, ProcessingError::KernelFault(_)));
    assert!(!err.is_retryable());
    assert!(input.balanced() && output.balanced());
}

#[test]
fn test_same_buffer_twice() {
    let buffer = StubHost::zeroed(3, 3);

    let err = process_frame(&buffer, &buffer, ProcessingMode::Grayscale).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::LeaseAcquisitionFailed(HostError {
            code: HostError::BUSY,
            ..
        })
    ));
    assert!(buffer.balanced());
    assert_eq!(buffer.acquires(), 1);
}

#[test]
fn test_empty_frame() {
    let input = StubHost::zeroed(0, 0);
    let output = StubHost::zeroed(0, 0);
    for mode in ProcessingMode::ALL {
        process_frame(&input, &output, mode).unwrap();
    }
    assert_eq!(output.releases(), ProcessingMode::ALL.len());
}

#[test]
fn test_custom_thresholds() {
    // weak step that only survives a lowered high threshold
    let (w, h) = (12u32, 8u32);
    let src: Vec<u8> = (0..w * h)
        .flat_map(|i| {
            let l = if i % w < w / 2 { 0 } else { 40 };
            [l, l, l, 255]
        })
        .collect();
    let input = StubHost::rgba(w, h, src);

    let strict = StubHost::zeroed(w, h);
    FrameProcessor::default()
        .process(&input, &strict, ProcessingMode::CannyStyle)
        .unwrap();
    assert!(strict.pixels().chunks(4).all(|p| p[0] == 0));

    let relaxed = StubHost::zeroed(w, h);
    let params = CannyParams {
        low_threshold: 20.0,
        high_threshold: 60.0,
        ..CannyParams::default()
    };
    FrameProcessor::new(params)
        .process(&input, &relaxed, ProcessingMode::CannyStyle)
        .unwrap();
    assert!(relaxed.pixels().chunks(4).any(|p| p[0] == 255));
}

#[test]
fn test_independent_frames_in_parallel() {
    let processor = FrameProcessor::default();
    let dims = FrameDimensions::new(32, 32);

    thread::scope(|s| {
        for seed in 0..4 {
            let processor = &processor;
            s.spawn(move || {
                let input = StubHost::rgba(dims.width, dims.height, common::noise(32, 32, seed));
                let output = StubHost::zeroed(dims.width, dims.height);
                for mode in ProcessingMode::ALL {
                    processor.process(&input, &output, mode).unwrap();
                }
                assert!(input.balanced() && output.balanced());
            });
        }
    });
}
