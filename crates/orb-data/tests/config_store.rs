//! 설정 저장소 동작 테스트 (인메모리 구현).

use chrono::NaiveTime;
use orb_core::{BreakoutType, StrategyConfig};
use orb_data::{
    ConfigStore, MemoryConfigStore, NormalizeOptions, NormalizedTable, Normalizer, RawTable,
    StoreError, TableSchema,
};
use rust_decimal_macros::dec;

fn conditions(rows: &[&[&str]]) -> NormalizedTable {
    let raw = RawTable::from_text_rows("conditions.csv", &["strategy_name", "lot_size", "sl_percentage"], rows);
    Normalizer::new(TableSchema::strategy_conditions(), NormalizeOptions::default())
        .normalize(&raw)
        .unwrap()
}

#[tokio::test]
async fn upsert_overwrites_every_field() {
    let store = MemoryConfigStore::new();
    let original = StrategyConfig::templates().remove(0);
    store.upsert_strategy_config(&original).await.unwrap();

    let replacement = StrategyConfig {
        strategy_name: original.strategy_name.clone(),
        ..StrategyConfig::templates().remove(1)
    };
    store.upsert_strategy_config(&replacement).await.unwrap();

    let stored = store.get(&original.strategy_name).await.unwrap();
    assert_eq!(stored, replacement);
    assert_eq!(stored.preferred_breakout_type, BreakoutType::PctBased);
    assert_eq!(stored.eod_time, NaiveTime::from_hms_opt(15, 29, 0).unwrap());
    assert_eq!(stored.box_sl_hard_pct, Some(dec!(30)));
    assert_eq!(store.strategy_names().await.unwrap(), vec![original.strategy_name]);
}

#[tokio::test]
async fn strategy_names_are_sorted() {
    let store = MemoryConfigStore::new();
    let templates = StrategyConfig::templates();
    store
        .upsert_strategy_configs(&[templates[1].clone(), templates[0].clone()])
        .await
        .unwrap();

    assert_eq!(
        store.strategy_names().await.unwrap(),
        vec!["strat_full_example", "strat_pct_example"]
    );
}

#[tokio::test]
async fn replace_conditions_replaces_wholesale() {
    let store = MemoryConfigStore::new();
    let first = conditions(&[&["strat_A", "75", "20"], &["strat_A", "50", "25"], &["strat_B", "75", "20"]]);
    assert_eq!(store.replace_conditions(&first).await.unwrap(), 3);

    let second = conditions(&[&["strat_C", "25", "10"]]);
    assert_eq!(store.replace_conditions(&second).await.unwrap(), 1);

    let stored = store.conditions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("strategy_name").unwrap().to_string(), "strat_C");
}

#[tokio::test]
async fn empty_replace_clears() {
    let store = MemoryConfigStore::new();
    store
        .replace_conditions(&conditions(&[&["strat_A", "75", "20"]]))
        .await
        .unwrap();

    let empty = conditions(&[]);
    assert_eq!(store.replace_conditions(&empty).await.unwrap(), 0);
    assert!(store.conditions().await.is_empty());
}

#[tokio::test]
async fn invalid_config_names_the_row() {
    let store = MemoryConfigStore::new();
    let mut bad = StrategyConfig::templates().remove(0);
    bad.strategy_name = "strat_bad".to_string();
    bad.small_candle_tf = 60;

    match store.upsert_strategy_config(&bad).await {
        Err(StoreError::Row { key, .. }) => assert_eq!(key, "strat_bad"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(store.get("strat_bad").await.is_none());
}
