use adrecon_types::{AdType, AppConfig, Platform};

#[test]
fn full_config_deserializes_from_toml() {
    let raw = r#"
        credentials_dir = "creds"

        [mediator]
        api_key = "max-key"

        [[mediator.applications]]
        name = "MyApp (Android)"
        platform = "android"
        package_name = "com.example.app"

        [[mediator.applications]]
        name = "MyApp (iOS)"
        platform = "ios"

        [networks.unity]
        enabled = true
        api_key = "unity-key"
        organization_id = "org-1"

        [networks.moloco]
        enabled = true
        email = "ops@example.com"
        password = "pw"
        platform_id = "PLATFORM"
        publisher_id = "PUB"

        [networks.moloco.ad_unit_mapping]
        "unit-17" = "rewarded"

        [validation]
        threshold_pct = 12.5

        [export]
        bucket = "reconciliation-data"
        project_id = "my-project"

        [alerting]
        webhook = "https://hooks.example.com/T000/B000"
    "#;

    let cfg: AppConfig = toml::from_str(raw).unwrap();
    cfg.validate().unwrap();

    assert_eq!(cfg.credentials_dir, "creds");
    assert_eq!(cfg.mediator.applications.len(), 2);
    assert_eq!(cfg.mediator.applications[1].platform, Platform::Ios);

    let unity = cfg.networks.unity.as_ref().unwrap();
    assert!(unity.enabled);
    assert_eq!(unity.organization_id, "org-1");

    let moloco = cfg.networks.moloco.as_ref().unwrap();
    assert_eq!(moloco.ad_unit_mapping.get("unit-17"), Some(&AdType::Rewarded));
    assert_eq!(moloco.time_zone, "UTC");

    assert_eq!(cfg.validation.threshold_pct, 12.5);
    assert_eq!(cfg.validation.min_revenue_floor, 25.0);
    assert_eq!(cfg.export.bucket.as_deref(), Some("reconciliation-data"));
    assert_eq!(cfg.export.prefix, "network_data");
    assert!(cfg.unknown_keys().is_empty());
}

#[test]
fn unknown_keys_are_collected_not_rejected() {
    let raw = r#"
        [mediator]
        api_key = "k"
        package_name = "com.example.app"

        [networks.smaato]
        enabled = true

        [typo_section]
        value = 1
    "#;

    let cfg: AppConfig = toml::from_str(raw).unwrap();
    cfg.validate().unwrap();

    let unknown = cfg.unknown_keys();
    assert!(unknown.contains(&"typo_section".to_string()), "{unknown:?}");
    assert!(unknown.contains(&"networks.smaato".to_string()), "{unknown:?}");
}

#[test]
fn disabled_block_keeps_credentials() {
    let raw = r#"
        [mediator]
        api_key = "k"
        package_name = "com.example.app"

        [networks.pangle]
        enabled = false
        user_id = "123"
        role_id = "456"
        secure_key = "sk"
    "#;

    let cfg: AppConfig = toml::from_str(raw).unwrap();
    let pangle = cfg.networks.pangle.unwrap();
    assert!(!pangle.enabled);
    assert_eq!(pangle.time_zone, 0);
    assert_eq!(pangle.currency, "usd");
}
