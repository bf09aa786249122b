use relay_service::config::get_configuration;
use serial_test::serial;

#[test]
#[serial]
fn base_configuration_loads() {
    let settings = get_configuration().expect("Failed to load configuration");

    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.upstream.base_url, "http://localhost:5000/api");
    assert_eq!(
        settings.upstream.allowed_endpoints,
        vec!["videos", "videos/generate", "videos/{id}"]
    );
    assert_eq!(settings.telemetry.log_level, "info");
}

#[test]
#[serial]
fn environment_overrides_base_file() {
    std::env::set_var("APP_UPSTREAM__BASE_URL", "https://inference.example.test/api");
    std::env::set_var("APP_SERVER__PORT", "9099");

    let settings = get_configuration();

    std::env::remove_var("APP_UPSTREAM__BASE_URL");
    std::env::remove_var("APP_SERVER__PORT");

    let settings = settings.expect("Failed to load configuration");
    assert_eq!(settings.upstream.base_url, "https://inference.example.test/api");
    assert_eq!(settings.server.port, 9099);
}
