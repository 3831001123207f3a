//! ffmpeg argument construction
//!
//! Each fold step reads the running intermediate (input 0) and the incoming
//! track (input 1) and writes a new intermediate:
//!
//! ```text
//! [0] -> body (up to the cue-out)  ----------------------------+
//! [0] -> tail (D seconds from the cue-out) -> style --+        |
//!                                                     amix -> concat -> out
//! [1] -> head (lead-in ending at the cue-in) -> style +        |
//! [1] -> rest (from the cue-in)  ------------------------------+
//! ```
//!
//! The graph depends only on the plan's style, duration and the two cue
//! offsets; sample format and loudness target are fixed per session.

use crate::config::RenderConfig;
use crate::planner::{TransitionPlan, TransitionStyle};
use std::path::Path;

/// Codec for lossless intermediates
pub const INTERMEDIATE_CODEC: &str = "pcm_s24le";

/// Graph-wide input normalization
fn normalize_chain(sample_rate: u32) -> String {
    format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts=stereo",
        sample_rate
    )
}

fn secs(value: f64) -> String {
    format!("{:.6}", value.max(0.0))
}

/// Where in the running intermediate and the incoming track one step cuts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCuts {
    /// Fade start, in intermediate time
    pub body_end: f64,
    /// Overlap length
    pub overlap: f64,
    /// Incoming cue-in, in incoming-track time
    pub mix_in: f64,
    /// Incoming source seconds consumed by the overlap
    pub lead_in: f64,
    pub stretch: Option<f64>,
}

impl StepCuts {
    /// `head` is the intermediate time at which the outgoing track's own
    /// time zero sits
    pub fn for_plan(plan: &TransitionPlan, head: f64) -> Self {
        let lead_in = plan.lead_in_seconds().min(plan.mix_in_point);
        Self {
            body_end: head + plan.mix_out_point,
            overlap: plan.duration_seconds,
            mix_in: plan.mix_in_point,
            lead_in,
            stretch: plan.tempo_stretch,
        }
    }
}

/// Fade filters for the outgoing and incoming halves of the overlap
fn style_chains(style: TransitionStyle, overlap: f64, config: &RenderConfig) -> (String, String) {
    let d = secs(overlap);
    let fade = |curve: &str| {
        (
            format!("afade=t=out:st=0:d={}:curve={}", d, curve),
            format!("afade=t=in:st=0:d={}:curve={}", d, curve),
        )
    };

    match style {
        TransitionStyle::LinearBlend => fade("tri"),
        TransitionStyle::ExponentialBlend => fade("exp"),
        TransitionStyle::QuickCut => fade("qsin"),
        TransitionStyle::FilterSweep => {
            let (out_fade, in_fade) = fade("tri");
            (
                format!("{},{}", sweep_commands(overlap, config), out_fade),
                in_fade,
            )
        }
        TransitionStyle::EqSwap => {
            let half = secs(overlap / 2.0);
            let crossover = config.eq_crossover_hz;
            let (out_fade, in_fade) = fade("tri");
            // Outgoing loses its bass at the midpoint, incoming gains it
            let out_chain = format!(
                "asendcmd=c='{} highpass@bass_out frequency {}',highpass@bass_out=f=1,{}",
                half, crossover, out_fade
            );
            let in_chain = format!(
                "asendcmd=c='{} highpass@bass_in frequency 1',highpass@bass_in=f={},{}",
                half, crossover, in_fade
            );
            (out_chain, in_chain)
        }
    }
}

/// Stepped, exponentially spaced high-pass sweep across the overlap
fn sweep_commands(overlap: f64, config: &RenderConfig) -> String {
    let steps = config.sweep_steps.max(1);
    let ratio = config.sweep_end_hz / config.sweep_start_hz;
    let commands: Vec<String> = (0..=steps)
        .map(|i| {
            let p = i as f64 / steps as f64;
            let freq = config.sweep_start_hz * ratio.powf(p);
            format!("{} highpass@sweep frequency {:.1}", secs(overlap * p), freq)
        })
        .collect();
    format!(
        "asendcmd=c='{}',highpass@sweep=f={:.1}",
        commands.join(";"),
        config.sweep_start_hz
    )
}

/// Filter graph for one fold step
pub fn step_graph(cuts: &StepCuts, style: TransitionStyle, config: &RenderConfig) -> String {
    let norm = normalize_chain(config.sample_rate);
    let (tail_style, head_style) = style_chains(style, cuts.overlap, config);
    let tempo = cuts
        .stretch
        .map(|f| format!(",atempo={:.6}", f))
        .unwrap_or_default();
    let has_body = cuts.body_end > 0.0;

    let mut graph = Vec::new();
    if has_body {
        graph.push(format!("[0:a]{},asplit=2[a_body][a_tail]", norm));
        graph.push(format!(
            "[a_body]atrim=end={},asetpts=PTS-STARTPTS[body]",
            secs(cuts.body_end)
        ));
    } else {
        graph.push(format!("[0:a]{}[a_tail]", norm));
    }
    graph.push(format!(
        "[a_tail]atrim=start={}:end={},asetpts=PTS-STARTPTS,{}[tail]",
        secs(cuts.body_end),
        secs(cuts.body_end + cuts.overlap),
        tail_style
    ));
    graph.push(format!("[1:a]{},asplit=2[b_head][b_rest]", norm));
    graph.push(format!(
        "[b_head]atrim=start={}:end={},asetpts=PTS-STARTPTS{},{}[head]",
        secs(cuts.mix_in - cuts.lead_in),
        secs(cuts.mix_in),
        tempo,
        head_style
    ));
    graph.push(format!(
        "[b_rest]atrim=start={},asetpts=PTS-STARTPTS[rest]",
        secs(cuts.mix_in)
    ));
    graph.push("[tail][head]amix=inputs=2:duration=longest:normalize=0[blend]".to_string());
    if has_body {
        graph.push("[body][blend][rest]concat=n=3:v=0:a=1[out]".to_string());
    } else {
        graph.push("[blend][rest]concat=n=2:v=0:a=1[out]".to_string());
    }
    graph.join(";")
}

/// Arguments for one fold step (output path appended by the encoder)
pub fn step_args(
    intermediate: &Path,
    incoming: &Path,
    cuts: &StepCuts,
    style: TransitionStyle,
    config: &RenderConfig,
) -> Vec<String> {
    vec![
        "-i".to_string(),
        intermediate.display().to_string(),
        "-i".to_string(),
        incoming.display().to_string(),
        "-filter_complex".to_string(),
        step_graph(cuts, style, config),
        "-map".to_string(),
        "[out]".to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-c:a".to_string(),
        INTERMEDIATE_CODEC.to_string(),
    ]
}

/// Arguments for the loudness-normalized MP3 master
pub fn master_args(input: &Path, config: &RenderConfig) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-af".to_string(),
        format!(
            "loudnorm=I={}:TP={}:LRA={},aresample={}",
            config.loudness_target_lufs,
            config.true_peak_db,
            config.loudness_range,
            config.sample_rate
        ),
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        format!("{}k", config.output_bitrate_kbps),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuts(stretch: Option<f64>) -> StepCuts {
        StepCuts {
            body_end: 280.0,
            overlap: 30.0,
            mix_in: 32.0,
            lead_in: 30.0 * stretch.unwrap_or(1.0),
            stretch,
        }
    }

    #[test]
    fn test_graph_has_all_chains() {
        let graph = step_graph(&cuts(None), TransitionStyle::LinearBlend, &RenderConfig::default());
        for label in ["[body]", "[tail]", "[head]", "[rest]", "[blend]", "[out]"] {
            assert!(graph.contains(label), "missing {} in {}", label, graph);
        }
        assert!(graph.contains("amix=inputs=2:duration=longest:normalize=0"));
        assert!(graph.contains("curve=tri"));
        assert!(graph.contains("atrim=end=280.000000"));
        assert!(graph.contains("atrim=start=2.000000:end=32.000000"));
        assert!(!graph.contains("atempo"));
    }

    #[test]
    fn test_stretch_adds_atempo_to_head() {
        let graph = step_graph(&cuts(Some(1.03)), TransitionStyle::ExponentialBlend, &RenderConfig::default());
        assert!(graph.contains("atempo=1.030000"));
        assert!(graph.contains("curve=exp"));
    }

    #[test]
    fn test_style_chains() {
        let cfg = RenderConfig::default();
        let sweep = step_graph(&cuts(None), TransitionStyle::FilterSweep, &cfg);
        assert!(sweep.contains("highpass@sweep"));
        assert!(sweep.contains("asendcmd"));

        let swap = step_graph(&cuts(None), TransitionStyle::EqSwap, &cfg);
        assert!(swap.contains("15.000000 highpass@bass_out frequency 200"));
        assert!(swap.contains("highpass@bass_in=f=200"));

        let cut = step_graph(&cuts(None), TransitionStyle::QuickCut, &cfg);
        assert!(cut.contains("curve=qsin"));
    }

    #[test]
    fn test_no_body_when_fading_from_start() {
        let mut c = cuts(None);
        c.body_end = 0.0;
        let graph = step_graph(&c, TransitionStyle::LinearBlend, &RenderConfig::default());
        assert!(!graph.contains("[body]"));
        assert!(graph.contains("concat=n=2"));
    }

    #[test]
    fn test_master_args() {
        let args = master_args(Path::new("/tmp/mix.wav"), &RenderConfig::default());
        let joined = args.join(" ");
        assert!(joined.contains("loudnorm=I=-14:TP=-1:LRA=11"));
        assert!(joined.contains("libmp3lame"));
        assert!(joined.contains("320k"));
    }
}
