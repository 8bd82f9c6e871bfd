//! Tool command templates.
//!
//! A [`ToolCommand`] is an argument list with placeholders for the scratch
//! input and output paths. The [`ProcessRunner`](crate::runner::ProcessRunner)
//! picks the real paths at run time, so the same template can run for many
//! buffers and never leaks paths between jobs.

use std::path::Path;

use crate::pool::ResourceClass;

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Literal(String),
    Input,
    Output,
}

/// Where the tool's result is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Tool writes a file; the extension tells ffmpeg which muxer to use.
    File { extension: String },
    /// Tool prints its result on stdout.
    Stdout,
}

/// Argument template for one external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<Arg>,
    output: OutputMode,
    class: ResourceClass,
}

impl ToolCommand {
    /// Create a template for an arbitrary program reading stdout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: OutputMode::Stdout,
            class: ResourceClass::Transcode,
        }
    }

    /// Add a literal argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Literal(arg.into()));
        self
    }

    /// Add multiple literal arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::Literal(a.into())));
        self
    }

    /// Placeholder for the staged input file.
    pub fn input(mut self) -> Self {
        self.args.push(Arg::Input);
        self
    }

    /// Placeholder for the output file; switches the output mode to file.
    pub fn output_file(mut self, extension: impl Into<String>) -> Self {
        self.args.push(Arg::Output);
        self.output = OutputMode::File {
            extension: extension.into(),
        };
        self
    }

    /// Read the result from stdout.
    pub fn stdout(mut self) -> Self {
        self.output = OutputMode::Stdout;
        self
    }

    /// Resource class the runner acquires a permit from.
    pub fn class(mut self, class: ResourceClass) -> Self {
        self.class = class;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output
    }

    pub fn resource_class(&self) -> ResourceClass {
        self.class
    }

    /// Substitute the scratch paths into the template.
    pub fn build_args(&self, input: &Path, output: Option<&Path>) -> Vec<String> {
        self.args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Literal(s) => Some(s.clone()),
                Arg::Input => Some(input.to_string_lossy().to_string()),
                Arg::Output => output.map(|p| p.to_string_lossy().to_string()),
            })
            .collect()
    }
}

/// Builder for ffmpeg templates.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Output container extension
    output_extension: String,
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self {
            input_args: Vec::new(),
            output_args: Vec::new(),
            output_extension: "bin".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Seek before decoding (fast input seek).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds.max(0.0)))
    }

    /// Limit the amount of input read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds.max(0.0)))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Downmix to the given channel count.
    pub fn audio_channels(self, channels: u8) -> Self {
        self.output_arg("-ac").output_arg(channels.to_string())
    }

    /// Resample audio.
    pub fn sample_rate(self, hz: u32) -> Self {
        self.output_arg("-ar").output_arg(hz.to_string())
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// JPEG quality scale (2 = best, 31 = worst).
    pub fn jpeg_quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.clamp(2, 31).to_string())
    }

    /// Output container extension.
    pub fn output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// Build the placeholder template.
    pub fn build(self) -> ToolCommand {
        ToolCommand::new("ffmpeg")
            .args(["-y", "-nostdin", "-hide_banner", "-v", "error"])
            .args(self.input_args)
            .arg("-i")
            .input()
            .args(self.output_args)
            .output_file(self.output_extension)
            .class(ResourceClass::Transcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ffmpeg_template() {
        let cmd = FfmpegCommand::new()
            .seek(10.0)
            .duration(30.0)
            .no_video()
            .audio_codec("libmp3lame")
            .output_extension("mp3")
            .build();

        let args = cmd.build_args(&PathBuf::from("/s/in.mp4"), Some(&PathBuf::from("/s/out.mp3")));
        let i = args.iter().position(|a| a == "-i").unwrap();
        let ss = args.iter().position(|a| a == "-ss").unwrap();

        assert!(ss < i, "seek must precede the input for fast seeking");
        assert_eq!(args[i + 1], "/s/in.mp4");
        assert_eq!(args.last().unwrap(), "/s/out.mp3");
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert_eq!(
            cmd.output_mode(),
            &OutputMode::File {
                extension: "mp3".to_string()
            }
        );
    }

    #[test]
    fn test_stdout_template_has_no_output_path() {
        let cmd = ToolCommand::new("ffprobe")
            .args(["-v", "error"])
            .input()
            .stdout()
            .class(ResourceClass::Probe);

        let args = cmd.build_args(&PathBuf::from("in.wav"), None);
        assert_eq!(args, vec!["-v", "error", "in.wav"]);
        assert_eq!(cmd.resource_class(), ResourceClass::Probe);
    }

    #[test]
    fn test_negative_seek_is_clamped() {
        let cmd = FfmpegCommand::new().seek(-3.0).build();
        let args = cmd.build_args(&PathBuf::from("a"), Some(&PathBuf::from("b")));
        assert!(args.contains(&"0.000".to_string()));
    }
}
