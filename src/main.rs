fn main() -> anyhow::Result<()> {
    readingcard_lib::run()
}
