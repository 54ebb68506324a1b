fn main() -> anyhow::Result<()> {
    wizard_cli::cli::main()
}
