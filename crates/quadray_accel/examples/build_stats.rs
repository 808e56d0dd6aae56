//! Build an SQBVH over a small scene and print its statistics.
//!
//! Run with `RUST_LOG=debug` to see the builder's own log lines. An optional
//! first argument is a JSON parameter block, e.g. `'{"spatialsplits": true}'`.

use quadray_accel::{
    grid_mesh, Interval, Primitive, Qbvh, QbvhConfig, Ray, Sphere, Triangle, Vec3,
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(json) => QbvhConfig::from_json_str(&json)?,
        None => QbvhConfig::default(),
    };

    println!("SQBVH build statistics");
    println!("======================");
    println!("{:?}", config);

    let scene = build_scene();
    let start = std::time::Instant::now();
    let qbvh = Qbvh::build(&scene, config)?;
    println!("Built in {:?}", start.elapsed());

    println!("Primitives:      {}", qbvh.primitives().len());
    println!("Statistics:      {}", qbvh.statistics());
    println!("Diagnostics:     {:?}", qbvh.diagnostics());
    println!("Quads:           {}", qbvh.quads().len());

    // Shoot a fan of rays down at the ground
    let rays: Vec<Ray> = (0..1024)
        .map(|i| {
            let x = (i % 32) as f32 * 0.6;
            let z = (i / 32) as f32 * 0.6;
            Ray::new_simple(Vec3::new(x, 20.0, z), Vec3::new(0.0, -1.0, 0.1))
        })
        .collect();
    let start = std::time::Instant::now();
    let hits = qbvh.intersect_batch(&rays, Interval::new(0.001, f32::INFINITY));
    let count = hits.iter().filter(|hit| hit.is_some()).count();
    println!("{} of {} rays hit in {:?}", count, rays.len(), start.elapsed());

    Ok(())
}

fn build_scene() -> Vec<Arc<dyn Primitive>> {
    let mut objects: Vec<Arc<dyn Primitive>> = Vec::new();

    // Ground
    objects.push(Arc::new(grid_mesh(64, 20.0, 0.0)));

    // A row of spheres
    for i in 0..10 {
        let x = 1.0 + i as f32 * 2.0;
        objects.push(Arc::new(Sphere::new(Vec3::new(x, 1.0, 10.0), 0.8)));
    }

    // Long thin triangles crossing the scene, where spatial splits help
    for i in 0..16 {
        let z = i as f32 * 1.25;
        objects.push(Arc::new(Triangle::new(
            Vec3::new(0.0, 2.0, z),
            Vec3::new(20.0, 2.0, z + 0.1),
            Vec3::new(20.0, 2.5, z),
        )));
    }

    objects
}
