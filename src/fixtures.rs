//! Seed listings loaded into the store at process start.

use crate::models::{Condition, Listing};

struct Seed {
    id: &'static str,
    make: &'static str,
    model: &'static str,
    year: i32,
    price: f64,
    mileage: u32,
    image_url: &'static str,
    featured: bool,
    condition: Condition,
    description: &'static str,
    additional_details: Option<&'static str>,
    photos: &'static [&'static str],
    engine: &'static str,
    transmission: &'static str,
    exterior_color: &'static str,
    interior_color: &'static str,
    vin: Option<&'static str>,
}

const SEEDS: [Seed; 6] = [
    Seed {
        id: "1",
        make: "Toyota",
        model: "Camry",
        year: 2022,
        price: 28000.0,
        mileage: 15000,
        image_url: "/images/cars/toyota-camry-main.png",
        featured: true,
        condition: Condition::UsedLikeNew,
        description: "A reliable and fuel-efficient sedan, perfect for daily commutes.",
        additional_details: Some("Single owner, non-smoker, regular maintenance."),
        photos: &[
            "/images/cars/toyota-camry-detail1.png",
            "/images/cars/toyota-camry-detail2.png",
        ],
        engine: "2.5L I4",
        transmission: "8-Speed Automatic",
        exterior_color: "Celestial Silver Metallic",
        interior_color: "Black",
        vin: Some("123ABC456DEF789G"),
    },
    Seed {
        id: "2",
        make: "Honda",
        model: "CR-V",
        year: 2021,
        price: 32000.0,
        mileage: 22000,
        image_url: "/images/cars/honda-crv-main.png",
        featured: true,
        condition: Condition::UsedGood,
        description: "Spacious and versatile SUV with advanced safety features.",
        additional_details: Some("Family-owned, great for road trips."),
        photos: &["/images/cars/honda-crv-detail1.png"],
        engine: "1.5L Turbo I4",
        transmission: "CVT",
        exterior_color: "Sonic Gray Pearl",
        interior_color: "Gray",
        vin: None,
    },
    Seed {
        id: "3",
        make: "Ford",
        model: "F-150",
        year: 2020,
        price: 45000.0,
        mileage: 35000,
        image_url: "/images/cars/ford-f150-main.png",
        featured: false,
        condition: Condition::UsedGood,
        description: "Powerful and rugged pickup truck, ready for any job.",
        additional_details: Some("Towing package included."),
        photos: &[],
        engine: "5.0L V8",
        transmission: "10-Speed Automatic",
        exterior_color: "Race Red",
        interior_color: "Black",
        vin: None,
    },
    Seed {
        id: "4",
        make: "BMW",
        model: "3 Series",
        year: 2023,
        price: 52000.0,
        mileage: 5000,
        image_url: "/images/cars/bmw-3series-main.png",
        featured: true,
        condition: Condition::New,
        description: "Luxury sports sedan with exhilarating performance and cutting-edge tech.",
        additional_details: Some("M Sport package, premium sound system."),
        photos: &[],
        engine: "2.0L Turbo I4",
        transmission: "8-Speed Automatic",
        exterior_color: "Alpine White",
        interior_color: "Cognac",
        vin: None,
    },
    Seed {
        id: "5",
        make: "Chevrolet",
        model: "Tahoe",
        year: 2019,
        price: 38000.0,
        mileage: 45000,
        image_url: "/images/cars/chevrolet-tahoe-main.png",
        featured: false,
        condition: Condition::UsedFair,
        description: "Full-size SUV with plenty of room for passengers and cargo.",
        additional_details: None,
        photos: &[],
        engine: "5.3L V8",
        transmission: "6-Speed Automatic",
        exterior_color: "Black",
        interior_color: "Jet Black",
        vin: None,
    },
    Seed {
        id: "6",
        make: "Nissan",
        model: "Altima",
        year: 2021,
        price: 23000.0,
        mileage: 28000,
        image_url: "/images/cars/nissan-altima-main.png",
        featured: false,
        condition: Condition::UsedGood,
        description: "Comfortable mid-size sedan with good fuel economy.",
        additional_details: None,
        photos: &["/images/cars/nissan-altima-detail1.png"],
        engine: "2.5L I4",
        transmission: "CVT",
        exterior_color: "Gun Metallic",
        interior_color: "Charcoal",
        vin: None,
    },
];

/// The six storefront demo listings, in display order.
pub fn seed_listings() -> Vec<Listing> {
    SEEDS.iter().map(Seed::to_listing).collect()
}

impl Seed {
    fn to_listing(&self) -> Listing {
        Listing {
            id: self.id.to_string(),
            make: self.make.to_string(),
            model: self.model.to_string(),
            year: self.year,
            price: self.price,
            mileage: self.mileage,
            image_url: self.image_url.to_string(),
            featured: self.featured,
            condition: self.condition,
            description: self.description.to_string(),
            additional_details: self.additional_details.map(str::to_string),
            photos: self.photos.iter().map(|p| p.to_string()).collect(),
            engine: Some(self.engine.to_string()),
            transmission: Some(self.transmission.to_string()),
            fuel_type: Some("Gasoline".to_string()),
            exterior_color: Some(self.exterior_color.to_string()),
            interior_color: Some(self.interior_color.to_string()),
            vin: self.vin.map(str::to_string),
        }
    }
}
