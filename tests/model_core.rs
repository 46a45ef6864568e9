//! End-to-end tests for the model core: frames from a store, inference,
//! training and persistence.

use std::collections::BTreeMap;
use std::env::temp_dir;
use std::sync::Arc;

use a3c_trader::frame::ONE_HOUR_MS;
use a3c_trader::rl::training::returns::target_returns;
use a3c_trader::{
    A3cError, AppConfig, FileModelStore, Frame, FrameService, InMemoryMarketStore,
    InferenceBackend, ModelLifecycle, PredictionLog, PricePoint, Predictor, Trade, TradeAction,
    TradeStep, Trainer, TrainerConfig, TrainingBackend,
};

const INSTRUMENT: &str = "BTC-USD";

fn scratch_folder(tag: &str) -> std::path::PathBuf {
    temp_dir().join(format!("a3c-{tag}-{}", uuid::Uuid::new_v4()))
}

/// One tick per bin, stamped at the bin's upper bound
fn hourly_ticks(end: i64, bins: usize) -> Vec<PricePoint> {
    let step = ONE_HOUR_MS / bins as i64;
    let start = end - ONE_HOUR_MS;
    (1..=bins as i64)
        .map(|i| {
            let value = 30_000.0 + (i as f64 * 0.7).sin() * 50.0;
            PricePoint::new(start + i * step, INSTRUMENT, value)
        })
        .collect()
}

#[tokio::test]
async fn test_one_tick_per_bin_frame_is_the_ticks() {
    let end = 1_700_000_000_000 - (1_700_000_000_000 % ONE_HOUR_MS);
    let ticks = hourly_ticks(end, 60);
    let expected: Vec<f64> = ticks.iter().map(|p| p.value).collect();

    // arrival order must not matter
    let mut shuffled = ticks.clone();
    shuffled.reverse();
    shuffled.swap(3, 40);

    let service = FrameService::new(InMemoryMarketStore::with_prices(shuffled), 60);
    let frame = service.lookback_frame(INSTRUMENT, end).await.unwrap();

    assert_eq!(frame.len(), 60);
    assert_eq!(frame.values(), expected.as_slice());
}

#[tokio::test]
async fn test_gap_in_ticks_fails_the_frame() {
    let end = 2 * ONE_HOUR_MS;
    let mut ticks = hourly_ticks(end, 60);
    ticks.remove(17);

    let service = FrameService::new(InMemoryMarketStore::with_prices(ticks), 60);
    let result = service.lookback_frame(INSTRUMENT, end).await;

    assert!(matches!(result, Err(A3cError::EmptyBin { bin: 17, .. })));
}

#[tokio::test]
async fn test_load_without_snapshot_matches_fresh_topology() {
    let config = AppConfig::default_config(scratch_folder("load").to_str().unwrap());
    let lifecycle = ModelLifecycle::from_config(&config);
    let device = Default::default();

    let loaded = lifecycle
        .load::<InferenceBackend>("never-saved", &device)
        .await
        .unwrap();
    let created = lifecycle
        .create::<InferenceBackend>("never-saved", &device)
        .unwrap();

    assert_eq!(loaded.input_size(), config.a3c.input_size);
    assert_eq!(loaded.parameter_shapes(), created.parameter_shapes());
    // nothing is written by a load
    assert!(!lifecycle.store().model_folder().join("never-saved").exists());
}

#[test]
fn test_three_step_trade_targets() {
    let steps = [(0i64, 0.5f32), (30_000, 0.8), (90_000, 1.2)]
        .into_iter()
        .map(|(time, value_prediction)| TradeStep {
            time,
            observation: Frame::new(vec![1.0; 25]),
            action_probabilities: vec![0.25; 4],
            value_prediction,
            portfolio_change: BTreeMap::new(),
            action: TradeAction::Hold,
        })
        .collect();
    let trade = Trade::new(steps, 30.0);

    let targets = target_returns(&trade, 0.99).unwrap();
    let init_r = 1.2f32 as f64;

    let expected_1 = init_r * 0.99f64.powf(1.0 + 60_000f64.ln()) + 10.0;
    let expected_0 = init_r * 0.99f64.powf(1.0 + 90_000f64.ln());
    assert_eq!(targets.len(), 2);
    assert!((targets[0].target - expected_1).abs() < 1e-9);
    assert!((targets[1].target - expected_0).abs() < 1e-9);
}

#[tokio::test]
async fn test_predict_trade_train_and_reload() {
    let folder = scratch_folder("cycle");
    let mut config = AppConfig::default_config(folder.to_str().unwrap());
    config.a3c.input_size = 60;
    config.frame_size = 60;

    let lifecycle = ModelLifecycle::from_config(&config);
    let device = Default::default();
    let handle = Arc::new(
        lifecycle
            .open::<TrainingBackend>("btc-a3c", &device)
            .await
            .unwrap(),
    );
    let predictor = Predictor::new(Arc::clone(&handle));

    // three decisions, ten minutes apart
    let base = 100 * ONE_HOUR_MS;
    let store = InMemoryMarketStore::new();
    for tick in (base - ONE_HOUR_MS..=base + 20 * 60_000).step_by(60_000) {
        // prices relative to the entry price
        let value = 1.0 + ((tick / 60_000) as f64 * 0.1).cos() * 0.01;
        store.push_price(PricePoint::new(tick, INSTRUMENT, value)).await;
    }
    let frames = FrameService::new(store, config.frame_size);

    let mut steps = Vec::new();
    for (i, time) in [base, base + 600_000, base + 1_200_000].into_iter().enumerate() {
        let observation = frames.lookback_frame(INSTRUMENT, time).await.unwrap();
        let prediction = predictor
            .predict_and_log(frames.store(), time, &observation)
            .await
            .unwrap();
        let mut portfolio_change = BTreeMap::new();
        portfolio_change.insert("USD".to_string(), [-1_000.0, 0.0, 1_030.0][i]);
        steps.push(TradeStep {
            time,
            observation,
            action_probabilities: prediction.probabilities.clone(),
            value_prediction: prediction.value(),
            portfolio_change,
            action: prediction.best_action().unwrap_or_default(),
        });
    }
    let logged = frames
        .store()
        .predictions("btc-a3c", base, base + ONE_HOUR_MS)
        .await
        .unwrap();
    assert_eq!(logged.len(), 3);

    let trade = Trade::from_portfolio(steps, "USD");
    assert!((trade.profit() - 30.0).abs() < 1e-9);

    let trainer = Trainer::new(TrainerConfig::from(&config.a3c)).unwrap();
    let report = trainer.train(&handle, &lifecycle, &[trade]).await.unwrap();
    assert!(report.applied);
    assert_eq!(report.steps, 2);
    assert_eq!(handle.version(), 1);

    // the persisted snapshot is exactly the published model
    let reloaded = lifecycle
        .load::<TrainingBackend>("btc-a3c", &device)
        .await
        .unwrap();
    assert_eq!(
        reloaded.parameter_values().unwrap(),
        handle.snapshot().await.parameter_values().unwrap()
    );

    let _ = std::fs::remove_dir_all(&folder);
}

#[tokio::test]
async fn test_concurrent_predictions_see_whole_models() {
    let folder = scratch_folder("concurrent");
    let lifecycle = ModelLifecycle::new(FileModelStore::new(&folder), 30);
    let device = Default::default();
    let handle = Arc::new(lifecycle.open::<TrainingBackend>("m", &device).await.unwrap());
    let frame = Frame::new((0..30).map(|i| 1.0 + i as f64 / 30.0).collect());

    let (_, initial) = handle.infer(&frame).await.unwrap();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let predictor = Predictor::new(Arc::clone(&handle));
            let frame = frame.clone();
            tokio::spawn(async move { predictor.predict(&frame).await })
        })
        .collect();

    let trade = Trade::new(
        (0..3)
            .map(|i| TradeStep {
                time: i * 60_000,
                observation: frame.clone(),
                action_probabilities: vec![0.25; 4],
                value_prediction: 0.0,
                portfolio_change: BTreeMap::new(),
                action: TradeAction::Hold,
            })
            .collect(),
        3.0,
    );
    let trainer = Trainer::new(TrainerConfig::default()).unwrap();
    trainer.train(&handle, &lifecycle, &[trade]).await.unwrap();
    let (_, updated) = handle.infer(&frame).await.unwrap();

    for reader in readers {
        let prediction = reader.await.unwrap().unwrap();
        let value = prediction.value();
        assert!(
            value.to_bits() == initial.to_bits() || value.to_bits() == updated.to_bits(),
            "reader saw a value from neither model: {value}"
        );
    }

    let _ = std::fs::remove_dir_all(&folder);
}
