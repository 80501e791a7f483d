// src/simulation/csv.rs

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::simulation::engagement::Engagement;

/// 軌道出力の列名
pub const CSV_COLUMNS: [&str; 22] = [
    "time(s)",
    "tgt_x(m)",
    "tgt_y(m)",
    "tgt_vx(m/s)",
    "tgt_vy(m/s)",
    "tgt_ay(m/s2)",
    "msl_x(m)",
    "msl_y(m)",
    "msl_vx(m/s)",
    "msl_vy(m/s)",
    "rdr_angle(rad)",
    "rdr_range(m)",
    "fc_range(m)",
    "fc_rdot(m/s)",
    "weave_omega2(rad2/s2)",
    "skr_valid(bool)",
    "skr_angle(rad)",
    "mt_range(m)",
    "mt_rdot(m/s)",
    "mt_losr(rad/s)",
    "gdn_cmd(m/s2)",
    "ap_accel(m/s2)",
];

/// CSV出力の設定とヘッダーの書き込み
pub fn setup_csv_output<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>, io::Error> {
    let output_file = File::create(path)?;
    let mut writer = BufWriter::new(output_file);
    write_csv_header(&mut writer)?;
    Ok(writer)
}

/// CSVヘッダーの書き込み
pub fn write_csv_header<W: Write>(writer: &mut W) -> Result<(), io::Error> {
    let mut header = CSV_COLUMNS.join(",");
    header.push('\n');
    writer.write_all(header.as_bytes())
}

/// CSV行の作成
///
/// 推定値が無い列は空欄にする。
pub fn create_csv_row(time: f64, ctx: &Engagement) -> String {
    let tgt = &ctx.target.kinematics;
    let msl = &ctx.missile.kinematics;
    let fc = ctx.fc_track.estimate;
    let weave = ctx.weave_track.estimate;
    let mt = ctx.missile_track.estimate;

    let fields = [
        format!("{}", time),
        format!("{}", tgt.position[0]),
        format!("{}", tgt.position[1]),
        format!("{}", tgt.velocity[0]),
        format!("{}", tgt.velocity[1]),
        format!("{}", tgt.acceleration[1]),
        format!("{}", msl.position[0]),
        format!("{}", msl.position[1]),
        format!("{}", msl.velocity[0]),
        format!("{}", msl.velocity[1]),
        format!("{}", ctx.radar.angle),
        format!("{}", ctx.radar.range),
        optional(fc.map(|e| e.range)),
        optional(fc.map(|e| e.range_rate)),
        optional(weave.map(|e| e.omega2)),
        format!("{}", ctx.seeker.valid),
        format!("{}", ctx.seeker.angle),
        optional(mt.map(|e| e.range)),
        optional(mt.map(|e| e.range_rate)),
        optional(mt.map(|e| e.los_rate)),
        format!("{}", ctx.guidance_command),
        format!("{}", ctx.autopilot_accel),
    ];

    let mut row = fields.join(",");
    row.push('\n');
    row
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
