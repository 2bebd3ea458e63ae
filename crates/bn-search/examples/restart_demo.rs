use bn_search::*;
use bn_types::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// Penalized log-likelihood over weighted rows; rows with a missing cell in a
/// family are skipped for that family.
struct PenalizedLikelihood;

impl ScoringOracle for PenalizedLikelihood {
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError> {
        let total = dataset.total_weight();
        if total <= 0.0 {
            return Err(ScoreError::IllConditioned {
                message: "dataset has no weight".to_string(),
            });
        }

        let mut score = 0.0;
        for node in 0..graph.num_nodes() {
            let parents = graph.parents(node).as_slice();
            let mut family: HashMap<(Vec<u32>, u32), f64> = HashMap::new();
            let mut configs: HashMap<Vec<u32>, f64> = HashMap::new();

            for row in dataset.instances() {
                let key: Option<Vec<u32>> = parents.iter().map(|&p| row.values[p]).collect();
                if let (Some(key), Some(value)) = (key, row.values[node]) {
                    *family.entry((key.clone(), value)).or_default() += row.weight;
                    *configs.entry(key).or_default() += row.weight;
                }
            }

            for ((key, _), count) in &family {
                score += count * (count / configs[key]).ln();
            }

            let parent_configs: f64 = parents
                .iter()
                .map(|&p| dataset.cardinality(p) as f64)
                .product();
            let free = parent_configs * (dataset.cardinality(node) as f64 - 1.0);
            score -= 0.5 * total.ln() * free;
        }
        Ok(score)
    }

    fn name(&self) -> &str {
        "penalized-likelihood"
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bn_search=info".parse()?))
        .init();

    // class -> a, class -> b, a -> c, with noise and a few missing cells.
    let mut dataset = Dataset::new(
        vec![
            Attribute::new("class", 2),
            Attribute::new("a", 2),
            Attribute::new("b", 3),
            Attribute::new("c", 2),
        ],
        0,
    )?;
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let noisy = |value: u32, cardinality: u32, rng: &mut ChaCha8Rng| {
        if rng.gen_bool(0.1) {
            rng.gen_range(0..cardinality)
        } else {
            value
        }
    };
    for _ in 0..500 {
        let class = rng.gen_range(0..2);
        let a = noisy(class, 2, &mut rng);
        let b = noisy(class * 2, 3, &mut rng);
        let c = noisy(1 - a, 2, &mut rng);
        let mut values = vec![Some(class), Some(a), Some(b), Some(c)];
        if rng.gen_bool(0.02) {
            values[3] = None;
        }
        dataset.push(Instance::new(values).with_weight(rng.gen_range(0.5..1.5)))?;
    }
    println!(
        "Generated {} rows, {} missing cells in c",
        dataset.num_instances(),
        dataset.missing_count(3)
    );

    let config = SearchConfig::from_json(r#"{"run_count": 5, "seed": 42, "allow_arc_reversal": true}"#)?;
    let oracle = MemoizedOracle::new(PenalizedLikelihood);
    let (tx, rx) = crossbeam_channel::unbounded();

    let mut graph = Graph::new(dataset.num_attributes());
    let report = RepeatedHillClimber::new(config, &oracle)
        .with_events(tx)
        .search(&mut graph, &dataset, &CancellationToken::new())?;

    for event in rx.try_iter() {
        if let SearchEvent::RunFinished(run) = event {
            println!(
                "run {}: {} edits, score {:.2} -> {:.2}",
                run.run_index, run.edits_applied, run.start_score, run.final_score
            );
        }
    }
    println!("Best score {:.2} ({:?})", report.best_score, report.state);
    println!("Oracle cache: {} hits, {} misses", oracle.hits(), oracle.misses());
    print!("{graph}");

    Ok(())
}
