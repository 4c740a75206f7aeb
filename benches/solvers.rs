use cobyla::{
    algo::cobyla::{Cobyla, CobylaOptions},
    nalgebra as na,
    testing::*,
    Optimizer, Problem, Status,
};
use criterion::{criterion_group, criterion_main, Criterion};

const MAX_ITERS: usize = 1_000_000;

fn minimize<F>(f: &F, options: CobylaOptions<F>, mut x: na::OVector<f64, na::Dyn>) -> bool
where
    F: TestProblem<Field = f64>,
{
    let dom = f.domain();
    let mut optimizer = Cobyla::with_options(f, &dom, options);

    for _ in 0..MAX_ITERS {
        match optimizer.opt_next(f, &dom, &mut x) {
            Ok(Some(status)) => return status == Status::Normal,
            Ok(None) => {}
            Err(_) => return false,
        }
    }

    false
}

fn options<F: Problem<Field = f64>>(rho_end: f64) -> CobylaOptions<F> {
    let mut options = CobylaOptions::default();
    options.set_rho_end(rho_end).set_max_evals(10_000);
    options
}

fn paraboloid(c: &mut Criterion) {
    let f = ShiftedParaboloid::new();
    let x = &f.initials()[0];

    c.bench_function("cobyla paraboloid", |b| {
        b.iter(|| assert!(minimize(&f, options(1e-8), x.clone_owned())))
    });
}

fn half_plane(c: &mut Criterion) {
    let f = HalfPlane::new();
    let x = &f.initials()[0];

    c.bench_function("cobyla half plane", |b| {
        b.iter(|| assert!(minimize(&f, options(1e-8), x.clone_owned())))
    });
}

fn sphere_large(c: &mut Criterion) {
    let f = Sphere::new(20);
    let x = &f.initials()[0];

    c.bench_function("cobyla sphere large", |b| {
        b.iter(|| assert!(minimize(&f, options(1e-6), x.clone_owned())))
    });
}

fn rosen_suzuki(c: &mut Criterion) {
    let f = RosenSuzuki::new();
    let x = &f.initials()[0];

    c.bench_function("cobyla rosen-suzuki", |b| {
        b.iter(|| assert!(minimize(&f, options(1e-8), x.clone_owned())))
    });
}

fn hock_schittkowski100(c: &mut Criterion) {
    let f = HockSchittkowski100::new();
    let x = &f.initials()[0];

    c.bench_function("cobyla hock-schittkowski 100", |b| {
        b.iter(|| assert!(minimize(&f, options(1e-8), x.clone_owned())))
    });
}

criterion_group!(
    benches,
    paraboloid,
    half_plane,
    sphere_large,
    rosen_suzuki,
    hock_schittkowski100
);
criterion_main!(benches);
