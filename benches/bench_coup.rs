use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use coup_session::{Game, Rules};

fn complete_game(num_players: usize, seed: u64) {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut game = Game::create("bench", num_players, Rules::default()).unwrap();
    for seat in 0..num_players {
        game.add_player(&format!("p{seat}"), &mut rng).unwrap();
    }

    let mut game = black_box(game);
    for _ in 0..5000 {
        let mut moves = game.moves();
        if moves.is_empty() {
            break;
        }

        let random_index = rng.gen_range(0..moves.len());
        let random_move = moves.swap_remove(random_index);

        game.play(random_move, &mut rng).unwrap();

        if game.winner().is_some() {
            break;
        }
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("complete_game");
    for num_players in 3..=6usize {
        let mut seed = 0;
        group.bench_with_input(BenchmarkId::from_parameter(num_players), &num_players, |b, &num_players| {
            b.iter(|| {
                seed += 1;
                complete_game(num_players, seed)
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
