// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use criterion::{criterion_group, criterion_main, Criterion};
use edgevision_rt::{
    convert::yuyv_to_rgba,
    gateway::FrameProcessor,
    image::FrameDimensions,
    kernel::ProcessingMode,
    lease::MemoryBuffer,
};

const DIMS: [(u32, u32); 4] = [(320, 240), (640, 480), (1280, 720), (1920, 1080)];

fn gradient(dims: FrameDimensions) -> Vec<u8> {
    let w = dims.width as usize;
    (0..dims.pixel_count())
        .flat_map(|i| {
            let (x, y) = (i % w, i / w);
            [(x * 7) as u8, (y * 3) as u8, ((x ^ y) * 5) as u8, 255]
        })
        .collect()
}

pub fn benchmark_kernels(c: &mut Criterion) {
    let processor = FrameProcessor::default();

    for mode in ProcessingMode::ALL {
        let mut group = c.benchmark_group(format!("kernel/{}", mode));
        for (w, h) in DIMS {
            let dims = FrameDimensions::new(w, h);
            let input = MemoryBuffer::from_pixels(dims, gradient(dims)).unwrap();
            let output = MemoryBuffer::new(dims);
            group.bench_with_input(format!("{}x{}", w, h), &(input, output), |b, bufs| {
                b.iter(|| processor.process(&bufs.0, &bufs.1, mode).unwrap())
            });
        }
    }
}

pub fn benchmark_yuyv(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert/yuyv");
    for (w, h) in DIMS {
        let dims = FrameDimensions::new(w, h);
        let src = vec![128u8; dims.pixel_count() * 2];
        let mut dst = vec![0u8; dims.byte_len()];
        group.bench_function(format!("{}x{}", w, h), |b| {
            b.iter(|| yuyv_to_rgba(&src, &mut dst, dims).unwrap())
        });
    }
}

criterion_group!(benches, benchmark_kernels, benchmark_yuyv);
criterion_main!(benches);
