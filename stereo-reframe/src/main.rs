use std::{fs::File, io::BufWriter, process::ExitCode};

use clap::Parser;
use mpeg4::FragmentedMp4Writer;
use stereo_reframe::{
    ffmpeg::{FfmpegHevcEncoder, FfmpegSource},
    Cli, ContainerSink, Error, FrameSource, OutputSink, Pipeline, RawSink, Result, SinkError,
};
use tracing_subscriber::EnvFilter;

fn run(cli: &Cli) -> Result<()> {
    let source = FfmpegSource::open(&cli.input)?;
    let info = source.stream_info();
    let config = cli.pipeline_config(info.width, info.height);
    config.validate()?;
    if let Some((num, den)) = info.frame_rate {
        if den == 0 || num != config.frame_rate * den {
            tracing::warn!(
                "input reports {}/{} frames per second but timestamps assume {}",
                num,
                den,
                config.frame_rate
            );
        }
    }

    let encoder_config = config.encoder_config()?;
    let encoder = FfmpegHevcEncoder::new(&encoder_config).map_err(|e| Error::Config { message: e.to_string() })?;

    let file = File::create(&cli.output).map_err(|source| SinkError::Io { source })?;
    let output = BufWriter::new(file);
    let sink = match cli.writes_container() {
        true => OutputSink::Container(ContainerSink::new(FragmentedMp4Writer::new(output), config.stream_config()?)),
        false => OutputSink::Raw(RawSink::new(output)),
    };
    tracing::info!(
        output = %cli.output.display(),
        container = cli.writes_container(),
        "writing {}x{} output",
        config.output_width,
        config.output_height
    );

    let stats = Pipeline::new(config, source, encoder, sink)?.run()?;
    tracing::info!(units = stats.units_written(), bytes = stats.bytes_written, "done");
    Ok(())
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
