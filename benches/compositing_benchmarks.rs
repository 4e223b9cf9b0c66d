use bgremove_compose::{
    compose::{BackgroundSynthesizer, Compositor, ResizeManager, ShadowRenderer},
    types::{Color, GradientSpec},
    CompositingPipeline, MockBackend, ModelRegistry, PipelineConfig, ProcessingOptions,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Arc;

const SIZES: [(u32, u32); 3] = [(512, 512), (1024, 768), (2048, 1536)];

/// Opaque disc in the middle of a transparent canvas
fn foreground(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 3.0;
    RgbaImage::from_fn(width, height, |x, y| {
        let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        if distance < radius {
            Rgba([180, 40, 90, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn benchmark_backdrops(c: &mut Criterion) {
    let mut group = c.benchmark_group("backdrop");
    let gradient = GradientSpec {
        start: Color::new(0x66, 0x7E, 0xEA),
        end: Color::new(0x76, 0x4B, 0xA2),
    };

    for (width, height) in SIZES {
        let label = format!("{width}x{height}");
        group.bench_with_input(BenchmarkId::new("solid", &label), &(width, height), |b, &(w, h)| {
            b.iter(|| BackgroundSynthesizer::solid(black_box(w), black_box(h), Color::WHITE));
        });
        group.bench_with_input(BenchmarkId::new("gradient", &label), &(width, height), |b, &(w, h)| {
            b.iter(|| BackgroundSynthesizer::gradient(black_box(w), black_box(h), gradient));
        });
    }
    group.finish();
}

fn benchmark_composite_and_shadow(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    group.sample_size(10);
    let shadow = ShadowRenderer::default();

    for (width, height) in SIZES {
        let label = format!("{width}x{height}");
        let fg = foreground(width, height);
        let backdrop = BackgroundSynthesizer::solid(width, height, Color::WHITE);

        group.bench_with_input(BenchmarkId::new("over_solid", &label), &fg, |b, fg| {
            b.iter(|| Compositor::composite_over(black_box(&backdrop), black_box(fg), (0, 0)));
        });

        let composited = DynamicImage::ImageRgb8(Compositor::composite_over(&backdrop, &fg, (0, 0)));
        let fg_dynamic = DynamicImage::ImageRgba8(fg.clone());
        group.bench_with_input(BenchmarkId::new("shadow", &label), &fg_dynamic, |b, fg| {
            b.iter(|| shadow.render(black_box(composited.clone()), black_box(fg)));
        });
    }
    group.finish();
}

fn benchmark_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize");
    group.sample_size(10);
    let resizer = ResizeManager::default();

    for (width, height) in SIZES {
        let image = DynamicImage::ImageRgba8(foreground(width, height));
        group.bench_with_input(
            BenchmarkId::new("downscale_restore", format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| {
                    let downscaled = resizer.downscale(image.clone());
                    resizer.restore(downscaled.image, width, height)
                });
            },
        );
    }
    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    let Ok(registry) = ModelRegistry::builder()
        .register_backend("general", Box::new(MockBackend::with_input_size(320)))
        .and_then(|builder| builder.build())
    else {
        eprintln!("Failed to build mock registry, skipping pipeline benchmark");
        return;
    };
    let Ok(pipeline) = CompositingPipeline::new(PipelineConfig::default(), Arc::new(registry)) else {
        return;
    };
    let options = ProcessingOptions::builder()
        .gradient("#667EEA", "#764BA2")
        .shadow(true)
        .build();

    for (width, height) in SIZES {
        let image = DynamicImage::ImageRgba8(foreground(width, height));
        group.bench_with_input(
            BenchmarkId::new("gradient_shadow", format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| pipeline.process(image.clone(), &options));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_backdrops,
    benchmark_composite_and_shadow,
    benchmark_resize,
    benchmark_pipeline
);
criterion_main!(benches);
