use cobyla::algo::cobyla::CobylaOptions;
use cobyla::nalgebra as na;
use cobyla::{Domain, Function, OptimizerDriver, Problem, ProblemError, Status};
use na::{Dyn, IsContiguous};

// https://en.wikipedia.org/wiki/Rosenbrock_function constrained to a disk
struct Rosenbrock {
    a: f64,
    b: f64,
}

impl Problem for Rosenbrock {
    type Field = f64;

    fn domain(&self) -> Domain<Self::Field> {
        [(-2.0, 2.0), (-1.0, 3.0)].into_iter().collect()
    }

    fn constraint_count(&self) -> usize {
        1
    }
}

impl Function for Rosenbrock {
    fn apply<Sx, Scx>(
        &self,
        x: &na::Vector<Self::Field, Dyn, Sx>,
        cx: &mut na::Vector<Self::Field, Dyn, Scx>,
    ) -> Result<Self::Field, ProblemError>
    where
        Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
        Scx: na::storage::StorageMut<Self::Field, Dyn> + IsContiguous,
    {
        cx[0] = 2.0 - x[0].powi(2) - x[1].powi(2);

        Ok((self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2))
    }
}

fn main() -> Result<(), String> {
    let f = Rosenbrock { a: 1.0, b: 100.0 };

    let mut options = CobylaOptions::default();
    options.set_rho_begin(0.5).set_rho_end(1e-6).set_max_evals(20_000);

    let mut optimizer = OptimizerDriver::builder(&f)
        .with_initial(vec![-1.2, 1.0])
        .with_options(options)
        .build();

    let status = optimizer
        .find(|state| {
            if state.iter() % 50 == 0 {
                println!(
                    "iter = {}\tf(x) = {}\tmaxcv = {}\trho = {}\tx = {:?}",
                    state.iter(),
                    state.fx(),
                    state.resmax(),
                    state.rho(),
                    state.x()
                );
            }
            state.evaluations() >= 10_000
        })
        .map_err(|error| format!("{error}"))?;

    match status {
        Some(Status::Normal) => {
            println!(
                "solved in {} evaluations: f(x) = {}\tx = {:?}",
                optimizer.evaluations(),
                optimizer.fx(),
                optimizer.x()
            );
            Ok(())
        }
        Some(status) => Err(format!("finished with {status:?}")),
        None => Err("did not converge".to_string()),
    }
}
