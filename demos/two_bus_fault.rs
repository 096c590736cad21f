//! Solves a small feeder, then runs every fault type at its far end.
//!
//! `RUST_LOG=rustfault=debug cargo run --example two_bus_fault` shows the
//! Newton iterations.
use num_complex::Complex64;
use rustfault::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut net = NetworkModel::new(100.0);
    net.add_bus(Bus::slack("B1", 1.0, 0.0).with_rated_kv(138.0))?;
    net.add_bus(Bus::pq("B2", 0.0, 0.0).with_rated_kv(138.0))?;
    net.add_bus(Bus::pq("B3", 0.4, 0.15).with_rated_kv(13.8))?;
    net.add_branch(
        Branch::from_z("L12", "B1", "B2", Complex64::new(0.01, 0.03))?
            .with_charging(0.02)
            .with_zero_sequence(Complex64::new(0.03, 0.1), None),
    )?;
    let meta = TransformerMeta {
        grounded_lv: true,
        ..TransformerMeta::new(WindingConnection::Delta, WindingConnection::Wye)
    };
    net.add_branch(
        Branch::from_z("T23", "B2", "B3", Complex64::new(0.0, 0.08))?
            .with_tap(0.975, 0.0)
            .with_transformer(meta),
    )?;

    let report = solve_power_flow(&mut net, &PowerFlowOptions::default())?;
    println!("converged in {} iterations\n", report.iterations);
    net.print_res_bus();
    net.print_res_line()?;

    let source = SourceAugmentation::with_thevenin(
        TheveninSource::new(Complex64::new(0.0, 0.1)).with_z0(Complex64::new(0.0, 0.05)),
    );
    let solver = ShortCircuitSolver::new(&net, &source)?;
    for (kind, phase) in [("3P", "A"), ("SLG", "A"), ("LL", "BC"), ("DLG", "BCG")] {
        let spec = FaultSpec::parse("B3", kind, phase)?;
        let result = solver.run(&spec)?;
        println!(
            "\n{} fault at B3: |I| = {:.4} pu ({:.3} kA)",
            spec.fault_type,
            result.fault_current_pu.norm(),
            result.fault_current_ka().unwrap_or(f64::NAN)
        );
        result.print();
    }
    Ok(())
}
