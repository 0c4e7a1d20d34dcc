use gpig::readers;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/geotiff/Rrs_443.tif".to_string());

    let reader = readers::create_reader(path)?;
    let data = reader.read_data()?;
    println!("{}", data);
    if let Some(geotransform) = data.geotransform {
        println!("Geotransform: {:?}", geotransform);
    }

    Ok(())
}
