// ==========================================
// 光伏 BOS 配置引擎 - 额定电流计算
// ==========================================
// 规则: 派生设备额定电流 = ceil(源输出 × 1.25)
// 合并规则: 先求和再乘系数，再向上取整（不是各自取整后相加）
// ==========================================

/// NEC 连续负载系数
pub const SAFETY_FACTOR: f64 = 1.25;

/// 计算派生额定电流
///
/// # 参数
/// - output_amps: 源设备最大持续输出（A）
///
/// # 返回
/// - ceil(output × 1.25)；非正数或非有限值返回 0
///
/// # 说明
/// 先按 1e-6 精度消除浮点误差，避免 24.000000001 被取整为 25
pub fn required_amps(output_amps: f64) -> u32 {
    if !output_amps.is_finite() || output_amps <= 0.0 {
        return 0;
    }
    let scaled = output_amps * SAFETY_FACTOR;
    let cleaned = (scaled * 1e6).round() / 1e6;
    cleaned.ceil() as u32
}

/// 多个源输出合并后的额定电流: ceil(Σ × 1.25)
pub fn combined_required_amps(outputs: &[f64]) -> u32 {
    required_amps(outputs.iter().copied().filter(|v| v.is_finite()).sum())
}

/// 电流数值格式化（整数不带小数位）
pub fn format_amps(amps: f64) -> String {
    if (amps - amps.round()).abs() < 1e-9 {
        format!("{}", amps.round() as i64)
    } else {
        let s = format!("{:.2}", amps);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// "20A × 1.25 = 25A (PV-Only)"
pub fn single_calculation(output_amps: f64, result: u32, tag: &str) -> String {
    format!("{}A × 1.25 = {}A ({})", format_amps(output_amps), result, tag)
}

/// "Inverter (20A) + Battery (10A) × 1.25 = 38A (AC-Coupled)"
pub fn ac_coupled_calculation(inverter_amps: f64, battery_amps: f64, result: u32) -> String {
    format!(
        "Inverter ({}A) + Battery ({}A) × 1.25 = {}A (AC-Coupled)",
        format_amps(inverter_amps),
        format_amps(battery_amps),
        result
    )
}

/// "Combined: (20A + 30A) × 1.25 = 63A"
pub fn combined_calculation(outputs: &[f64], result: u32) -> String {
    let parts: Vec<String> = outputs.iter().map(|v| format!("{}A", format_amps(*v))).collect();
    format!("Combined: ({}) × 1.25 = {}A", parts.join(" + "), result)
}
