//! Fits XOR with a 2 → 8 → 1 ReLU network, one example per step.
//!
//! Run with `RUST_LOG=info cargo run --example regression`.

use log::info;
use minigrad::prelude::*;
use minigrad::train::{evaluate, train_step};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

fn main() -> minigrad::Result<()> {
    env_logger::init();

    let config = TrainConfig::default()
        .with_learning_rate(0.05)
        .with_epochs(2000)
        .with_log_every(200);
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(2024);
    let model = Sequential::new()
        .with(Dense::with_rng(2, 8, &mut rng))
        .with(Relu)
        .with(Dense::with_rng(8, 1, &mut rng));

    let mut batches: Vec<Batch> = [
        ([0.0, 0.0], 0.0),
        ([0.0, 1.0], 1.0),
        ([1.0, 0.0], 1.0),
        ([1.0, 1.0], 0.0),
    ]
    .into_iter()
    .map(|([a, b], y)| Batch::new(tensor!([[a, b]]), tensor!([[y]])))
    .collect();

    let mut sgd = Sgd::new(model.parameters(), config.learning_rate);
    for epoch in 1..=config.epochs {
        batches.shuffle(&mut rng);
        let mut total = 0.0;
        for batch in &batches {
            total += train_step(&model, &mut sgd, &Mse, batch, config.check_finite)?;
        }
        if epoch % config.log_every == 0 {
            info!("epoch {epoch}: mse {:.6}", total / batches.len() as f64);
        }
    }

    println!("final mse: {:.6}", evaluate(&model, &Mse, &batches)?);
    for batch in &batches {
        let prediction = model.forward(&batch.inputs)?;
        println!(
            "{:?} -> {:.3} (target {})",
            batch.inputs.value().data(),
            prediction.item().unwrap_or(f64::NAN),
            batch.targets.item().unwrap_or(f64::NAN),
        );
    }
    Ok(())
}
