use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nnet::linear_algebra::{Matrix, Value};
use nnet::{NeuralNetwork, TrainOptions};

criterion_main!(benches);
criterion_group!(benches, predict_small, predict_deep, train_iterations);

fn trained_network(hidden: Vec<usize>, rng: &mut StdRng) -> (NeuralNetwork, Matrix) {
    let examples = 64;
    let inputs = 8;

    let mut x = Matrix::zeros(examples, inputs);
    x.values_mut().for_each(|v| *v = rng.gen_range(-1.0..1.0));

    let mut t = Matrix::zeros(examples, 1);
    for (target, input) in t.iter_mut().zip(x.iter()) {
        target[0] = input.iter().sum::<Value>().sin();
    }

    let mut net = NeuralNetwork::with_rng(inputs, hidden, 1, rng);
    net.train(
        &x,
        &t,
        &TrainOptions {
            iterations: 10,
            ..Default::default()
        },
    )
    .unwrap();

    (net, x)
}

pub fn predict_small(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let (net, x) = trained_network(vec![10], &mut rng);

    c.bench_function("predict_small", |b| {
        b.iter(|| net.predict(black_box(&x)).unwrap())
    });
}

pub fn predict_deep(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let (net, x) = trained_network(vec![32, 32, 32], &mut rng);

    c.bench_function("predict_deep", |b| {
        b.iter(|| net.predict(black_box(&x)).unwrap())
    });
}

pub fn train_iterations(c: &mut Criterion) {
    c.bench_function("train_iterations", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(3);
            trained_network(black_box(vec![16, 16]), &mut rng)
        })
    });
}
