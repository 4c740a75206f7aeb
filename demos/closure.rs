use cobyla::{solve, ProblemError, Status};

// Minimize x * y subject to x^2 + y^2 <= 1, the optimum is in
// (1/sqrt(2), -1/sqrt(2)) or the symmetric point.
fn main() -> Result<(), String> {
    let mut x = [1.0, 1.0];

    let report = solve(2, 1, &mut x, 0.5, 1e-8, 2000, 1, false, |x, c| {
        if !x.iter().all(|xi| xi.is_finite()) {
            return Err(ProblemError::InvalidValue);
        }

        c[0] = 1.0 - x[0].powi(2) - x[1].powi(2);
        Ok(x[0] * x[1])
    })
    .map_err(|error| format!("{error}"))?;

    println!(
        "status = {:?}\tevaluations = {}\tf(x) = {}\tmaxcv = {}\tx = {:?}",
        report.status, report.evaluations, report.fx, report.resmax, x
    );

    if report.status == Status::Normal {
        Ok(())
    } else {
        Err("did not converge".to_string())
    }
}
