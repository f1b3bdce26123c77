//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use cwnt_core::prelude::*;
use std::thread;
use std::time::Instant;
use utils::series::DriftingPair;

/// 参与比较的分裂参数.
fn settings() -> [(&'static str, SplitterOptions); 4] {
    let base = SplitterOptions {
        volume_upper: 100_000,
        ..Default::default()
    };
    [
        ("default bounds", SplitterOptions::default()),
        ("std x 0.5", base),
        (
            "std x 0",
            SplitterOptions {
                std_factor: 0.0,
                ..base
            },
        ),
        (
            "std x 2",
            SplitterOptions {
                std_factor: 2.0,
                ..base
            },
        ),
    ]
}

/// 在 `frames` 上以 `options` 运行一次.
fn survey(frames: &[VolumeBuffer], options: SplitterOptions, threads: usize) -> Profile {
    let t = Instant::now();
    let mut profile = Profile::default();
    let segmenter = CrownWearingSegmenter::with_threads(Parameters::default(), threads)
        .expect("Building segmenter error")
        .with_splitter_options(options);
    for r in segmenter.segment_frames(frames).iter() {
        profile.record(r);
    }
    profile.finish(t.elapsed())
}

/// 实际运行.
pub fn run() -> AblationResult {
    let series = DriftingPair::default();
    let frames = series.generate();
    let settings = settings();
    let threads = (utils::cpus() / settings.len()).max(1);

    println!(
        "Running ablation studies on {} frames, {} threads per setting...",
        frames.len(),
        threads
    );
    thread::scope(|s| {
        let frames = frames.as_slice();
        let handles = settings.map(|(_, opt)| s.spawn(move || survey(frames, opt, threads)));

        AblationResult::from_iter(
            settings.into_iter().map(|(name, _)| name).zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
        .with_series(series)
    })
}
