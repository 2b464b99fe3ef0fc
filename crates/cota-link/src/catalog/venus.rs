use super::CommandTemplate as T;

pub(super) const TEMPLATES: &[T] = &[
    // Status queries.
    T::new("get_comm_channel", r#"{"Command":{"Type":"get_comm_channel"}}"#, &[]),
    T::new("get_tx_freq", r#"{"Command":{"Type":"get_tx_freq"}}"#, &[]),
    T::new("get_system_temp", r#"{"Command":{"Type":"get_system_temp"}}"#, &[]),
    T::new("get_valid_ambs", r#"{"Command":{"Type":"get_valid_ambs"}}"#, &[]),
    T::new("get_power_level", r#"{"Command":{"Type":"get_power_level"}}"#, &[]),
    T::new("get_system_state", r#"{"Command":{"Type":"get_system_state"}}"#, &[]),
    T::new("versions", r#"{"Command":{"Type":"versions"}}"#, &[]),
    T::new("get_tx_id", r#"{"Command":{"Type":"get_charger_id"}}"#, &[]),
    T::new("get_amb_info", r#"{"Command":{"Type":"get_amb_info"}}"#, &[]),
    // Clients.
    T::new("rx_list", r#"{"Command":{"Type":"client_list"}}"#, &[]),
    T::new(
        "rx_detail",
        r#"{"Command":{"Type":"client_detail","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "client_detail",
        r#"{"Command":{"Type":"client_detail","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "register_rx",
        r#"{"Command":{"Type":"register_client","Client ID":"%s","QueryType":%s}}"#,
        &["0", "5"],
    ),
    T::new(
        "remove_rx",
        r#"{"Command":{"Type":"remove_client","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "rx_leave",
        r#"{"Command":{"Type":"client_leave","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "rx_sleep",
        r#"{"Command":{"Type":"client_sleep","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "start_charging",
        r#"{"Command":{"Type":"start_charging","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "stop_charging",
        r#"{"Command":{"Type":"stop_charging","Client ID":"%s"}}"#,
        &["0"],
    ),
    T::new(
        "identify_rx",
        r#"{"Command":{"Type":"identify_client","Client ID":"%s","Duration":%s}}"#,
        &["0", "10"],
    ),
    T::new(
        "rx_config",
        r#"{"Command":{"Type":"client_config","Client ID":"%s","QueryType":%s}}"#,
        &["0", "5"],
    ),
    T::new(
        "app_command",
        r#"{"Command":{"Type":"client_command","Client ID":"%s","Data":%s}}"#,
        &["0", "[0]"],
    ),
    T::new(
        "app_command_data",
        r#"{"Command":{"Type":"client_command_data","Client ID":"%s"}}"#,
        &["0"],
    ),
    // Transmitter settings.
    T::new(
        "set_comm_channel",
        r#"{"Command":{"Type":"set_comm_channel","Channel":%s,"Client ID":"%s"}}"#,
        &["24", "0"],
    ),
    T::new(
        "set_valid_ambs",
        r#"{"Command":{"Type":"set_valid_ambs","Mask":"%s"}}"#,
        &["0xF"],
    ),
    T::new(
        "set_power_level",
        r#"{"Command":{"Type":"set_power_level","PowerLevel":%s}}"#,
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
    T::new("lpm_list", r#"{"Command":{"Type":"lpm_list"}}"#, &[]),
    T::new(
        "lpm_assign",
        r#"{"Command":{"Type":"lpm_assign","Client ID":"%s","Slot":"%s"}}"#,
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
    T::new("lpm", r#"{"Command":{"Type":"lpm","State":"%s"}}"#, &["on"]),
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
    T::new(
        "add_client",
        r#"{"Command":{"Type":"add_client","Data":"%s"}}"#,
        &["0"],
    ),
    T::new("pause", r#"{"Command":{"Type":"pause"}}"#, &[]),
    T::new("reboot", r#"{"Command":{"Type":"reboot"}}"#, &[]),
    T::new("reset_array", r#"{"Command":{"Type":"reset_array"}}"#, &[]),
    T::new("reset_fpga", r#"{"Command":{"Type":"reset_fpga"}}"#, &[]),
    T::new("reset_proxy", r#"{"Command":{"Type":"reset_proxy"}}"#, &[]),
    T::new("restart", r#"{"Command":{"Type":"restart"}}"#, &[]),
    T::new("run", r#"{"Command":{"Type":"run"}}"#, &[]),
];
