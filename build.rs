fn main() {
    // ESP-IDF link arguments only matter for the espidf feature;
    // host-target test builds skip them.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
