// ==========================================
// BOS API 集成测试
// ==========================================
// 覆盖: 系统合并/取消合并、Post Combine 槽位、单系统写入失败隔离
// ==========================================

mod test_helpers;

use serde_json::json;
use solar_bos::api::ApiError;
use solar_bos::app::AppState;
use solar_bos::domain::bos::{BosEquipmentItem, ConfigurationMatch};
use solar_bos::domain::combiner::{PostCombineBosEntry, SystemCombinerPanel};
use solar_bos::engine::auto_population::AutoPopulationOptions;
use solar_bos::repository::{ProjectStore, SqliteProjectStore};
use solar_bos::{BosSection, Confidence, PostCombineType, SystemNumber};
use std::collections::BTreeMap;
use test_helpers::{create_test_db, in_memory_orchestrator, seed_project, sol_ark_combined_fields};

const PROJECT: &str = "8d2b7c41-0000-4000-8000-000000000002";

fn disconnect_entry() -> PostCombineBosEntry {
    PostCombineBosEntry {
        equipment_type: "AC Disconnect".to_string(),
        make: Some("EATON".to_string()),
        model: Some("DG222URB".to_string()),
        amp_rating: Some("60".to_string()),
        is_new: true,
    }
}

#[tokio::test]
async fn test_combine_and_uncombine_systems() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let store = SqliteProjectStore::new(&db_path).unwrap();
    let mut fields = sol_ark_combined_fields(false);
    fields["ele_combine_systems"] = json!(false);
    seed_project(&store, PROJECT, fields).await;

    let state = AppState::new(db_path).unwrap();
    let api = &state.bos_api;

    let options = api.combine_options(PROJECT).await.unwrap();
    let labels: Vec<_> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Sol-Ark - Sys 1", "Sol-Ark - Sys 2"]);

    let mut landings = BTreeMap::new();
    landings.insert(SystemNumber::ONE, "Sol-Ark - Sys 1".to_string());
    let eligibility = api.combine_systems(PROJECT, &landings).await.unwrap();
    assert_eq!(eligibility.active_systems, vec![SystemNumber::ONE, SystemNumber::TWO]);

    let record = store.fetch_project_fields(PROJECT).await.unwrap();
    assert_eq!(record.flag("ele_combine_systems"), Some(true));
    assert_eq!(record.text("ele_combine_active_systems"), Some("1,2"));
    assert_eq!(record.text("ele_combine_system_desc"), Some("Combine 1 & 2"));
    assert_eq!(record.text("sys1_landing_destination"), Some("Sol-Ark - Sys 1"));
    assert!(!record.is_present("sys2_landing_destination"));

    api.uncombine_systems(PROJECT).await.unwrap();
    let record = store.fetch_project_fields(PROJECT).await.unwrap();
    assert_eq!(record.flag("ele_combine_systems"), Some(false));
    assert_eq!(record.text("ele_combine_system_desc"), Some("No Combine"));
    assert!(!record.is_present("ele_combine_active_systems"));
    assert!(!record.is_present("sys1_landing_destination"));
}

#[tokio::test]
async fn test_combine_rejects_single_system() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let store = SqliteProjectStore::new(&db_path).unwrap();
    seed_project(
        &store,
        PROJECT,
        json!({
            "sys1_solar_panel_make": "REC",
            "sys1_micro_inverter_make": "Enphase",
            "sys1_micro_inverter_model": "IQ8PLUS-72-2-US",
        }),
    )
    .await;

    let state = AppState::new(db_path).unwrap();
    let err = state
        .bos_api
        .combine_systems(PROJECT, &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    let record = store.fetch_project_fields(PROJECT).await.unwrap();
    assert!(!record.is_present("ele_combine_systems"));
}

#[tokio::test]
async fn test_post_combine_type3_blocked_by_combiner_panel() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let store = SqliteProjectStore::new(&db_path).unwrap();
    seed_project(&store, PROJECT, sol_ark_combined_fields(false)).await;

    let state = AppState::new(db_path).unwrap();
    let api = &state.bos_api;

    // 无汇流箱: Type 3 写入槽位 3
    api.save_post_combine_bos(PROJECT, PostCombineType::Type3, &disconnect_entry())
        .await
        .unwrap();
    let record = store.fetch_project_fields(PROJECT).await.unwrap();
    assert_eq!(
        record.text("post_sms_bos_sys1_type3_equipment_type"),
        Some("AC Disconnect")
    );
    api.clear_post_combine_bos(PROJECT, PostCombineType::Type3)
        .await
        .unwrap();

    let panel = SystemCombinerPanel {
        make: Some("Square D".to_string()),
        model: Some("QO142L225PG".to_string()),
        bus_amp_rating: Some("225".to_string()),
        ..Default::default()
    };
    api.save_system_combiner_panel(PROJECT, &panel).await.unwrap();

    let err = api
        .save_post_combine_bos(PROJECT, PostCombineType::Type3, &disconnect_entry())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::SlotUnavailable(_)));

    api.save_post_combine_bos(PROJECT, PostCombineType::Type1, &disconnect_entry())
        .await
        .unwrap();
    let record = store.fetch_project_fields(PROJECT).await.unwrap();
    assert_eq!(
        record.text("post_sms_bos_sys1_type1_equipment_type"),
        Some("Position Combiner Panel")
    );
    assert_eq!(
        record.text("post_sms_bos_sys1_type2_equipment_type"),
        Some("AC Disconnect")
    );
    assert!(!record.is_present("post_sms_bos_sys1_type3_equipment_type"));

    let view = api.load_post_combine_slots(PROJECT).await.unwrap();
    assert!(view.has_combiner_panel);
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].0, PostCombineType::Type1);
    assert_eq!(view.entries[0].1.amp_rating.as_deref(), Some("60"));
}

#[tokio::test]
async fn test_invalid_requests() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    let api = &state.bos_api;

    assert!(matches!(
        api.detect("  ").await.unwrap_err(),
        ApiError::InvalidInput(_)
    ));
    assert!(matches!(
        api.apply(PROJECT, None).await.unwrap_err(),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        api.save_system_combiner_panel(PROJECT, &SystemCombinerPanel::default())
            .await
            .unwrap_err(),
        ApiError::InvalidInput(_)
    ));
    assert_eq!(api.combined_max_output(PROJECT).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_system_write_does_not_block_others() {
    let mut fields = sol_ark_combined_fields(false);
    fields["ele_combine_systems"] = json!(false);
    let (store, _sink, orchestrator) = in_memory_orchestrator(PROJECT, fields);
    store.fail_writes_with_prefix("bos_sys2_");

    let outcome = orchestrator.detect(PROJECT).await.unwrap();
    assert_eq!(outcome.combine_mode, None);
    assert_eq!(outcome.matches.len(), 2);

    let report = orchestrator
        .apply(PROJECT, &outcome.matches, &AutoPopulationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed_systems(), vec![SystemNumber::TWO]);
    assert!(!report.is_success());

    let record = &report.refreshed;
    assert_eq!(record.text("bos_sys1_type1_equipment_type"), Some("Uni-Directional Meter"));
    assert_eq!(record.text("bos_sys1_type1_amp_rating"), Some("25"));
    assert!(!record.is_present("bos_sys2_type1_equipment_type"));
}

#[tokio::test]
async fn test_type3_combine_item_reports_slot_error() {
    let mut fields = sol_ark_combined_fields(false);
    fields["system_combiner_panel_1_make"] = json!("Square D");
    let (_store, _sink, orchestrator) = in_memory_orchestrator(PROJECT, fields);

    let mut m = ConfigurationMatch::new("MANUAL_COMBINE", "Manual Combine", 1, Confidence::High, SystemNumber::ONE);
    m.bos_equipment = vec![
        BosEquipmentItem::new(SystemNumber::ONE, BosSection::Combine, 1, "AC Disconnect"),
        BosEquipmentItem::new(SystemNumber::ONE, BosSection::Combine, 3, "AC Disconnect"),
    ];

    let report = orchestrator
        .apply(PROJECT, &[m], &AutoPopulationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed_systems(), vec![SystemNumber::ONE]);
    assert_eq!(report.systems[0].errors.len(), 1);
    assert_eq!(
        report.refreshed.text("post_sms_bos_sys1_type2_equipment_type"),
        Some("AC Disconnect")
    );
    assert!(!report.refreshed.is_present("post_sms_bos_sys1_type3_equipment_type"));
}
