/// The xtask binary delegates entirely to nih_plug_xtask, which provides
/// the `bundle` subcommand. Usage:
///
///   cargo xtask bundle bbd-delay --release
///
/// This compiles the plugin as a cdylib and packages it into
/// `target/bundled/BBD Delay.vst3` and `target/bundled/BBD Delay.clap`.
fn main() -> nih_plug_xtask::Result<()> {
    nih_plug_xtask::main()
}
