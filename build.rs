use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Necessary for ESP-IDF
    embuild::espidf::sysenv::output();

    println!("cargo:rerun-if-changed=wifi_config.h");
    println!("cargo:rerun-if-changed=partitions.csv");
    println!("cargo:rerun-if-changed=src/templates");

    // Station credentials compiled in as defaults
    let wifi_config_path = "wifi_config.h";
    if Path::new(wifi_config_path).exists() {
        let contents = fs::read_to_string(wifi_config_path)?;

        let ssid = define_value(&contents, "WIFI_SSID").unwrap_or_default();
        let password = define_value(&contents, "WIFI_PASSWORD").unwrap_or_default();
        println!("cargo:rustc-env=WIFI_SSID={}", ssid);
        println!("cargo:rustc-env=WIFI_PASSWORD={}", password);
    } else {
        // Access point only until credentials are stored in NVS
        println!("cargo:rustc-env=WIFI_SSID=");
        println!("cargo:rustc-env=WIFI_PASSWORD=");
        println!("cargo:warning=wifi_config.h not found! Copy wifi_config.h.example to wifi_config.h and add your credentials.");
    }

    Ok(())
}

// Quoted value of `#define NAME "value"`
fn define_value<'a>(contents: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("#define {}", name);
    contents
        .lines()
        .find(|l| {
            l.trim_start()
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
        .and_then(|l| l.split('"').nth(1))
}
