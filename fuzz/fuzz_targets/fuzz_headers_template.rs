#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(template) = volley_config::parse_headers(data) {
        // A rebuilt URL always carries the https scheme.
        if let Ok(url) = template.url() {
            assert!(url.starts_with("https://"));
        }
        assert!(
            !template
                .send_headers()
                .keys()
                .any(|k| k.eq_ignore_ascii_case("content-length"))
        );
    }
});
