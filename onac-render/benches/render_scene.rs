use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use onac_core::stimulus::{GREY, WHITE};
use onac_core::{Checkerboard, Position, Scene, Stimulus};
use onac_render::{Renderer as _, SkiaRenderer};

fn harness() -> (SkiaRenderer, Vec<u8>) {
    let width = 1280u32;
    let height = 720u32;
    let r = SkiaRenderer::new(width, height).expect("renderer");
    let fb = vec![0u8; (width * height * 4) as usize];
    (r, fb)
}

/// One frame of the visual stimulation trial: board, fixation and target dot.
fn stimulation_scene(inverted: bool) -> Scene {
    Scene::blank(GREY)
        .with(Stimulus::Checkerboard(Checkerboard {
            radius: 360.0,
            radial_cycles: 6,
            angular_cycles: 12,
            wedge: (0.0, 360.0),
            position: Position::CENTRE,
            inverted,
        }))
        .with(Stimulus::Fixation {
            size: 40.0,
            color: WHITE,
        })
        .with(Stimulus::Dot {
            position: Position::new(120.0, -80.0),
            diameter: 25.0,
            color: [255, 0, 255, 255],
        })
}

pub fn bench_render_scene(c: &mut Criterion) {
    let mut g = c.benchmark_group("render_scene");
    g.sample_size(40);

    g.bench_function("cold_stimulation_frame", |b| {
        b.iter_batched(
            harness,
            |(mut r, mut fb)| {
                let stats = r.render_frame(&stimulation_scene(false), &mut fb);
                black_box(stats).expect("frame");
            },
            BatchSize::SmallInput,
        )
    });

    g.bench_function("warm_reversal_frames", |b| {
        let (mut r, mut fb) = harness();
        let scenes = [stimulation_scene(false), stimulation_scene(true)];
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            let stats = r.render_frame(&scenes[i % 2], &mut fb);
            black_box(stats).expect("frame");
        })
    });

    g.finish();
}

criterion_group!(benches, bench_render_scene);
criterion_main!(benches);
