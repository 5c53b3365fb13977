use netconfig::encoding;
use netconfig::parse::{dbm_to_percent, parse_block_scan, parse_cell_scan, parse_line_scan};

#[test]
fn terse_line_with_plain_bssid() {
    let parsed = parse_line_scan("MyNet:75:WPA2:AA:BB:CC:DD:EE:FF:6\n");
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.anomalies, 0);

    let record = &parsed.records[0];
    assert_eq!(record.ssid, "MyNet");
    assert_eq!(record.signal_strength, 75);
    assert_eq!(record.security, "WPA2");
    assert_eq!(record.bssid, "AA:BB:CC:DD:EE:FF");
    assert_eq!(record.channel, 6);
}

#[test]
fn dbm_clamps_at_both_ends() {
    assert_eq!(dbm_to_percent(-90), 0);
    assert_eq!(dbm_to_percent(-30), 100);
    assert_eq!(dbm_to_percent(-200), 0);
    assert_eq!(dbm_to_percent(0), 100);
    assert!((-90..=-30).map(dbm_to_percent).all(|p| p <= 100));
}

#[test]
fn block_output_decoded_from_gbk() {
    let text = "SSID 1 : 家里\n    身份验证                : WPA2 - 个人\n         信号               : 64%\n         信道               : 6\n";
    let (bytes, _, _) = encoding_rs::GBK.encode(text);

    let decoded = encoding::normalize(&bytes).unwrap();
    let parsed = parse_block_scan(&decoded);
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].ssid, "家里");
    assert_eq!(parsed.records[0].signal_strength, 64);
    assert_eq!(parsed.records[0].channel, 6);
}

#[test]
fn empty_inputs_yield_nothing() {
    for parsed in [parse_block_scan(""), parse_line_scan(""), parse_cell_scan("")] {
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.anomalies, 0);
    }
}
