//! Example: epipolar-constrained matching on a synthetic two-view scene
//!
//! Usage:
//!   cargo run --example match_pair -- [layout] [output_image]
//!
//! `layout` is "side-by-side" (default) or "overlay". The rendered matches
//! are saved to "output_matches.png" unless an output path is given.

use image::GrayImage;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use parallax_geometry::{CameraIntrinsics, RansacEightPoint};
use parallax_matcher::{
    draw_matches, BinaryDescriptor, DrawLayout, EpipolarMatcher, Frame, HammingMatcher, KeyPoint,
    LogSink, ScalePyramid,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::env;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let layout_name = args.get(1).map(|s| s.as_str()).unwrap_or("side-by-side");
    let output_path = args.get(2).map(|s| s.as_str()).unwrap_or("output_matches.png");

    let layout: DrawLayout = match layout_name.parse() {
        Ok(layout) => layout,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!("Valid layouts: side-by-side, overlay");
            std::process::exit(1);
        }
    };

    // Two cameras with a 0.3m baseline along +X, both looking down +Z
    let camera = CameraIntrinsics::simple(500.0, 640, 480);
    let pose1 = Isometry3::identity();
    let pose2 = Isometry3::from_parts(
        Translation3::new(-0.3, 0.0, 0.0),
        UnitQuaternion::identity(),
    );
    let t21 = pose2 * pose1.inverse();

    // Scatter 3D points in front of both cameras and keep the ones that
    // project inside both images
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut keypoints1 = Vec::new();
    let mut keypoints2 = Vec::new();
    let mut descriptors = Vec::new();

    for _ in 0..120 {
        let pw = Point3::new(
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.3..0.3),
            rng.gen_range(1.0..4.0),
        );
        let p1 = camera.project(&pw.coords);
        let p2 = camera.project(&(t21 * pw).coords);

        if !camera.contains(&p1) || !camera.contains(&p2) {
            continue;
        }

        let octave = rng.gen_range(0..4);
        keypoints1.push(KeyPoint::new(p1.x as f32, p1.y as f32, octave));
        keypoints2.push(KeyPoint::new(p2.x as f32, p2.y as f32, octave));
        descriptors.push(BinaryDescriptor([
            rng.gen(),
            rng.gen(),
            rng.gen(),
            rng.gen(),
        ]));
    }

    println!("Scene: {} keypoints visible in both frames", descriptors.len());

    // A faint gradient so the rendering is not pitch black
    let backdrop = GrayImage::from_fn(camera.width, camera.height, |x, y| {
        image::Luma([(((x + y) / 8) % 64 + 32) as u8])
    });

    let frame1 = Frame::new(
        backdrop.clone(),
        keypoints1,
        descriptors.clone(),
        camera,
        pose1,
    )
    .expect("frame 1 construction");
    let frame2 = Frame::new(backdrop, keypoints2, descriptors, camera, pose2)
        .expect("frame 2 construction");

    let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default())
        .with_diagnostics(Box::new(LogSink));

    // Initialization matching with the pose prior
    let start = std::time::Instant::now();
    let pairs = matcher
        .match_for_initialization(&frame1, &frame2)
        .expect("initialization matching");
    println!(
        "Initialization matcher: {} feature pairs in {:?}",
        pairs.len(),
        start.elapsed()
    );

    // General matching path: unconstrained match, inlier filter, F refit
    match matcher.match_unconstrained(&frame1, &frame2, &RansacEightPoint::default()) {
        Ok(refinement) => {
            println!(
                "Unconstrained matcher: {} epipolar inliers, refined F:",
                refinement.inlier_pairs.len()
            );
            println!("{:.6}", refinement.refined_f12);
        }
        Err(err) => println!("Unconstrained matcher gave up: {}", err),
    }

    println!("Saving visualization to: {}", output_path);
    let canvas = draw_matches(&frame1, &frame2, &pairs, layout);
    canvas.save(output_path).expect("failed to save output image");

    println!("Done!");
}
