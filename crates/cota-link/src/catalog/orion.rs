use super::CommandTemplate as T;

pub(super) const TEMPLATES: &[T] = &[
    // Status queries.
    T::new("get_comm_channel", r#"{"Command":{"Type":"get_comm_channel"}}"#, &[]),
    T::new("get_tx_freq", r#"{"Command":{"Type":"get_tx_freq"}}"#, &[]),
    T::new("get_system_temp", r#"{"Command":{"Type":"get_system_temp"}}"#, &[]),
    T::new("get_valid_ambs", r#"{"Command":{"Type":"get_valid_amb_mask"}}"#, &[]),
    T::new("get_power_level", r#"{"Command":{"Type":"get_power_level"}}"#, &[]),
    T::new("get_system_state", r#"{"Command":{"Type":"get_system_state"}}"#, &[]),
    T::new("versions", r#"{"Command":{"Type":"versions"}}"#, &[]),
    T::new("get_tx_id", r#"{"Command":{"Type":"get_charger_id"}}"#, &[]),
    T::new("get_amb_info", r#"{"Command":{"Type":"get_amb_info"}}"#, &[]),
    // Receivers.
    T::new("rx_list", r#"{"Command":{"Type":"rx_list"}}"#, &[]),
    T::new(
        "rx_detail",
        r#"{"Command":{"Type":"rx_detail","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "client_detail",
        r#"{"Command":{"Type":"lpm_rx_detail","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "register_rx",
        r#"{"Command":{"Type":"register_rx","RX ID":"%s","Query Type":%s}}"#,
        &["0", "5"],
    ),
    T::new(
        "remove_rx",
        r#"{"Command":{"Type":"remove_rx","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "rx_leave",
        r#"{"Command":{"Type":"rx_leave","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "rx_sleep",
        r#"{"Command":{"Type":"rx_sleep","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "start_charging",
        r#"{"Command":{"Type":"start_charging","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "stop_charging",
        r#"{"Command":{"Type":"stop_charging","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "identify_rx",
        r#"{"Command":{"Type":"identify_rx","RX ID":"%s","Duration":%s}}"#,
        &["0", "10"],
    ),
    T::new(
        "rx_config",
        r#"{"Command":{"Type":"rx_config","RX ID":"%s","Query Type":%s}}"#,
        &["0", "5"],
    ),
    T::new(
        "app_command",
        r#"{"Command":{"Type":"app_command","RX ID":"%s","App Command":%s,"Data":%s}}"#,
        &["0", "0", "[]"],
    ),
    T::new(
        "app_command_data",
        r#"{"Command":{"Type":"app_command_data","RX ID":"%s"}}"#,
        &["0"],
    ),
    // Transmitter settings.
    T::new(
        "set_comm_channel",
        r#"{"Command":{"Type":"set_comm_channel","Channel":%s,"RX ID":"%s"}}"#,
        &["24", "0"],
    ),
    T::new(
        "set_valid_ambs",
        r#"{"Command":{"Type":"set_valid_amb_mask","Mask":"%s"}}"#,
        &["0xF"],
    ),
    T::new(
        "set_power_level",
        r#"{"Command":{"Type":"set_power_level","Power Level":%s}}"#,
        &["13"],
    ),
    T::new(
        "send_disc",
        r#"{"Command":{"Type":"send_disc","Channel":%s}}"#,
        &["24"],
    ),
    T::new("calibrate", r#"{"Command":{"Type":"calibrate"}}"#, &[]),
    T::new("identify_tx", r#"{"Command":{"Type":"identify_tx"}}"#, &[]),
    T::new("shutdown", r#"{"Command":{"Type":"shutdown"}}"#, &[]),
    // Low-power mode.
    T::new(
        "lpm_list",
        r#"{"Command":{"Type":"lpm_list"}}"#,
        &[],
    ),
    T::new(
        "lpm_assign",
        r#"{"Command":{"Type":"lpm_assign","RX ID":"%s","Slot":"%s"}}"#,
        &["0", "NEXT"],
    ),
    T::new(
        "lpm_free",
        r#"{"Command":{"Type":"lpm_free","Slot":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "lpm_slots",
        r#"{"Command":{"Type":"lpm_slots","Slots":%s}}"#,
        &["0"],
    ),
    T::new(
        "lpm",
        r#"{"Command":{"Type":"lpm","State":"%s"}}"#,
        &["on"],
    ),
    // Configuration and diagnostics.
    T::new(
        "get_cfg_param",
        r#"{"Command":{"Type":"get_cfg_param","Param":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "set_cfg_param",
        r#"{"Command":{"Type":"set_cfg_param","Param":"%s","Value":"%s"}}"#,
        &["0", "0"],
    ),
    T::new(
        "get_mcu_log",
        r#"{"Command":{"Type":"get_mcu_log","Entries":%s,"File":"%s"}}"#,
        &["100", "mcu"],
    ),
    // Debug.
    T::new("charge_virtual", r#"{"Command":{"Type":"charge_virtual"}}"#, &[]),
    T::new(
        "set_fans_full",
        r#"{"Command":{"Type":"fans_full","Enable":%s}}"#,
        &["1"],
    ),
    T::new("pause", r#"{"Command":{"Type":"pause"}}"#, &[]),
    T::new("reboot", r#"{"Command":{"Type":"reboot"}}"#, &[]),
    T::new("reset_array", r#"{"Command":{"Type":"reset_array"}}"#, &[]),
    T::new("reset_nvm", r#"{"Command":{"Type":"reset_nvm"}}"#, &[]),
    T::new("reset_proxy", r#"{"Command":{"Type":"reset_proxy"}}"#, &[]),
    T::new(
        "reset_host",
        r#"{"Command":{"Type":"reset_host","Hold":%s,"Block":%s}}"#,
        &["0.5", "1.0"],
    ),
    T::new(
        "set_rssi_filter_en",
        r#"{"Command":{"Type":"rssi_filter_en","Enable":%s}}"#,
        &["1"],
    ),
    T::new("run", r#"{"Command":{"Type":"run"}}"#, &[]),
    T::new("sample_beacon", r#"{"Command":{"Type":"sample_beacon"}}"#, &[]),
    T::new(
        "set_tx_freq",
        r#"{"Command":{"Type":"set_tx_freq","Frequency":%s}}"#,
        &["2450"],
    ),
    T::new(
        "static_charge",
        r#"{"Command":{"Type":"static_charge","RX ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "static_power",
        r#"{"Command":{"Type":"static_power","Power":%s}}"#,
        &["0"],
    ),
];
