fn main() -> anyhow::Result<()> {
    pipebench::run()
}
