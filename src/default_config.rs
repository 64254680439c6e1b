pub const DEFAULT_CONFIG_TOML: &str = r#"[backend]
url = "http://127.0.0.1:8000"
api_key = ""
default_model = ""
timeout_secs = 60

[local]
enabled = false
url = "http://localhost:11434"
timeout_secs = 300
parallel = false

[conversation]
history_window = 5
listing_depth = 3
default_mode = "ask"

[theme]
transcript_bg = { r = 30, g = 32, b = 36 }
insights_bg = { r = 36, g = 38, b = 43 }
input_bg = { r = 46, g = 49, b = 56 }
status_bg = { r = 24, g = 26, b = 30 }
text_fg = { r = 222, g = 224, b = 228 }
muted_fg = { r = 150, g = 155, b = 165 }
active_fg = { r = 255, g = 255, b = 255 }
accent_fg = { r = 120, g = 180, b = 255 }
"#;
